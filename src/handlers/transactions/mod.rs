pub mod budget;
pub mod record;
pub mod simple;

pub use budget::list;
pub use record::delete as record_delete;
pub use record::get as record_get;
pub use record::patch as record_patch;
pub use simple::create;
