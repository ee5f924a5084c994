pub mod distance;
pub mod labelling;
pub mod morphology;
pub mod peaks;
pub mod preprocessing;
pub mod watershed;

pub use distance::*;
pub use labelling::*;
pub use morphology::*;
pub use peaks::*;
pub use preprocessing::*;
pub use watershed::*;
