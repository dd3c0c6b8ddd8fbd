pub mod time_entry;
pub mod work_item;
