mod model;
mod options;
mod store;

pub use model::{
    slugify, InstallationStatus, Instance, LoaderType, ModpackLink, OperationKind,
};
pub use options::LaunchOptions;
pub use store::InstanceStore;
