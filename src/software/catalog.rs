//! The extra software catalog and the checklist used to choose from it.

use anyhow::Result;

use super::InstallStrategy;
use crate::core::PinetError;
use crate::dialog::{Dialog, MenuOption};

/// An item in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwarePackage {
    /// Checklist tag
    pub name: String,
    /// Checklist description
    pub description: String,
    /// How it is installed
    pub strategy: InstallStrategy,
}

impl SoftwarePackage {
    pub fn new(name: &str, description: &str, strategy: InstallStrategy) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            strategy,
        }
    }
}

/// Every item offered on the extra software checklist.
#[must_use]
pub fn catalog() -> Vec<SoftwarePackage> {
    vec![
        SoftwarePackage::new(
            "Arduino-IDE",
            "Programming environment for Arduino microcontrollers",
            InstallStrategy::apt(["arduino"]),
        ),
        SoftwarePackage::new("Scratch-gpio", "A special version of scratch for GPIO work", InstallStrategy::ScratchGpio),
        SoftwarePackage::new("Epoptes", "Free and open source classroom management software", InstallStrategy::Epoptes),
        SoftwarePackage::new(
            "Custom-package",
            "Allows you to enter the name of a package from Raspbian repository",
            InstallStrategy::CustomApt,
        ),
        SoftwarePackage::new(
            "Custom-python",
            "Allows you to enter the name of a Python library from pip.",
            InstallStrategy::CustomPip,
        ),
    ]
}

/// Look up catalog items by name, case-insensitively, keeping catalog order.
pub fn find_packages(names: &[String]) -> Result<Vec<SoftwarePackage>, PinetError> {
    let all = catalog();
    if let Some(unknown) = names.iter().find(|n| !all.iter().any(|p| p.name.eq_ignore_ascii_case(n))) {
        return Err(PinetError::ValidationError {
            field: "software".to_string(),
            reason: format!(
                "'{unknown}' is not in the catalog (choose from {})",
                all.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ")
            ),
        });
    }

    Ok(all.into_iter().filter(|p| names.iter().any(|n| p.name.eq_ignore_ascii_case(n))).collect())
}

/// Let the operator choose items from the catalog.
///
/// Returns `None` if the checklist was cancelled. An empty selection is
/// confirmed before returning an empty list; a non-empty one is confirmed
/// before it is returned. Answering no to either shows the checklist again.
pub async fn choose_packages<D: Dialog>(dialog: &D) -> Result<Option<Vec<SoftwarePackage>>> {
    let all = catalog();
    let options: Vec<MenuOption> = all.iter().map(|p| MenuOption::new(&p.name, &p.description)).collect();

    dialog
        .message(
            "Additional Software",
            "In the next window you can select additional software you wish to install. Use space bar to select applications and hit enter when you are finished.",
        )
        .await?;

    loop {
        let Some(chosen) = dialog
            .multiselect(
                "Extra Software Submenu",
                "Select any software you want to install. Use space bar to select then enter to continue.",
                &options,
            )
            .await?
        else {
            return Ok(None);
        };

        if chosen.is_empty() {
            if dialog
                .confirm("Are you sure?", "Are you sure you don't want to install any additional software?")
                .await?
            {
                return Ok(Some(Vec::new()));
            }
            continue;
        }

        let text = format!("Are you sure you want to install this software?\n{}", chosen.join("\n"));
        if dialog.confirm("Are you sure?", &text).await? {
            return Ok(Some(all.into_iter().filter(|p| chosen.contains(&p.name)).collect()));
        }
    }
}
