mod codec;
mod header_page;
mod slotted_page;
mod table_page;

pub use header_page::{HeaderPage, HeaderPageRef};
pub use slotted_page::{SlotEntry, SlottedPage, SlottedPageRef};
pub use table_page::{TablePage, TablePageRef};
