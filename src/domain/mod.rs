pub mod event;
pub mod odds;
pub mod quote;
pub mod quote_book;

pub use event::*;
pub use odds::*;
pub use quote::*;
pub use quote_book::*;
