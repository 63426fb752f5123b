/// Descriptor module - the shader-visible view table

pub mod view_table;

pub use view_table::ViewTable;
