// Adapters layer: concrete implementations of the domain ports (HTTP map source, child processes, SUMO tool lookup).

pub mod overpass;
pub mod process;
pub mod sumo_tools;

pub use overpass::OverpassMapSource;
pub use process::TokioCommandRunner;
pub use sumo_tools::SumoTools;
