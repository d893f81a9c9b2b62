pub mod ai;
pub mod canvas_ops;
