/// Hydrant batch upload state machine
mod batch;

pub use batch::HydrantBatcher;
