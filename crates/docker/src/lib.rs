//! Container runtime boundary over the `docker` command line.
//!
//! The orchestration core consumes exactly this surface from a container
//! runtime: build an image, tag it, create a container with volume mounts,
//! start it, follow its combined output stream until exit, stop it, and
//! remove it. [`DockerCli`] implements the surface by shelling out to the
//! `docker` binary; [`ImageBuilder`] layers the shared-execution-image
//! policy on top.

pub mod builder;
pub mod cli;
pub mod error;
pub mod runtime;

pub use builder::ImageBuilder;
pub use cli::DockerCli;
pub use error::{BuildError, RuntimeError};
pub use runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, ImageRef, Mount};
