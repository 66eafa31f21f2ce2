// Domain layer: artifact model and ports (interfaces) for the map source and external tools.

pub mod model;
pub mod ports;
