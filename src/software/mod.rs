//! Extra software for the Raspberry Pis.
//!
//! Each installable item carries an [`InstallStrategy`] saying how it is
//! installed. The operator picks items from the [`catalog`] on a checklist;
//! the chosen items are installed after a single chroot `apt-get update`
//! and the NBD image is rebuilt once at the end.
//!
//! - [`apt`]: the [`PackageManager`] trait and its apt/pip implementation
//! - [`catalog`]: the selectable items and the checklist flow
//! - [`installer`]: runs each strategy

pub mod apt;
pub mod catalog;
pub mod installer;

pub use apt::{AptPackageManager, PackageManager};
pub use catalog::{SoftwarePackage, catalog, choose_packages, find_packages};
pub use installer::{InstallSummary, SoftwareInstaller, SystemPaths};

/// How a package is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStrategy {
    /// `apt-get install -y <flags> <packages>`
    Apt {
        /// Package names
        packages: Vec<String>,
        /// Install on the server rather than in the chroot
        on_server: bool,
        /// Extra `apt-get` flags
        flags: Vec<String>,
    },
    /// `pip install -U` and `pip3 install -U`
    Pip {
        /// Package names
        packages: Vec<String>,
        /// Install on the server rather than in the chroot
        on_server: bool,
    },
    /// Commands run one after another inside the chroot
    Script {
        /// Command lines, split on whitespace
        commands: Vec<String>,
    },
    /// Epoptes classroom management, server and client
    Epoptes,
    /// The ScratchGPIO installer and its desktop launcher
    ScratchGpio,
    /// An apt package named by the operator at install time
    CustomApt,
    /// A pip package named by the operator at install time
    CustomPip,
}

impl InstallStrategy {
    /// A chroot apt install of `packages` with no extra flags.
    pub fn apt<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Apt {
            packages: packages.into_iter().map(Into::into).collect(),
            on_server: false,
            flags: Vec::new(),
        }
    }

    /// Whether the operator must name the package before installing.
    #[must_use]
    pub const fn needs_name(&self) -> bool {
        matches!(self, Self::CustomApt | Self::CustomPip)
    }
}
