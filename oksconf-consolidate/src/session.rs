use anyhow::{anyhow, Context, Result};
use oksconf_config::Config;
use oksconf_dal::{DalObject, Field};
use oksconf_database::Database;
use tracing::{info, warn};

const DISABLED: &str = "disabled";

/// What [`set_enabled`] did to each of the requested resources
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToggleReport {
    /// Id of the session that was modified
    pub session: String,
    /// Resources whose state changed
    pub changed: Vec<String>,
    /// Resources that were already in the requested state
    pub unchanged: Vec<String>,
    /// Resources not found in the database
    pub missing: Vec<String>,
}

/// Returns the named session, or the first session of the database when no name is given
pub fn find_session<'d>(
    db: &'d impl Database,
    config: &Config,
    name: Option<&str>,
) -> Result<&'d DalObject> {
    let class = config.session_class();
    match name {
        Some(name) => db
            .get(class, name)
            .with_context(|| format!("Could not find {class} {name} in {}", db.root())),
        None => db
            .objects_of_class(class)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Could not find any {class} in {}", db.root())),
    }
}

/// Enables or disables resources in a session by removing them from, or adding them to, the
/// session's `disabled` relationship
///
/// Resources that cannot be found are reported and skipped. The session is only written back
/// when something changed.
pub fn set_enabled(
    db: &mut impl Database,
    config: &Config,
    session: Option<&str>,
    resources: &[String],
    enabled: bool,
) -> Result<ToggleReport> {
    let mut session = find_session(&*db, config, session)?.clone();
    let mut disabled = session.references(DISABLED).to_vec();
    let mut report = ToggleReport {
        session: session.id().to_owned(),
        ..Default::default()
    };

    for resource in resources {
        let identity = match db.get(config.resource_class(), resource) {
            Ok(object) => object.identity().clone(),
            Err(e) if e.is_not_found() => {
                warn!("Could not find Resource {resource} in {}", db.root());
                report.missing.push(resource.clone());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let position = disabled.iter().position(|target| target == &identity);
        match (enabled, position) {
            (false, Some(_)) => {
                info!(
                    "{resource} is already in disabled relationship of Session {}",
                    report.session
                );
                report.unchanged.push(resource.clone());
            }
            (false, None) => {
                info!(
                    "Adding {resource} to disabled relationship of Session {}",
                    report.session
                );
                disabled.push(identity);
                report.changed.push(resource.clone());
            }
            (true, None) => {
                info!(
                    "{resource} is not in disabled relationship of Session {}",
                    report.session
                );
                report.unchanged.push(resource.clone());
            }
            (true, Some(index)) => {
                info!(
                    "Removing {resource} from disabled relationship of Session {}",
                    report.session
                );
                disabled.remove(index);
                report.changed.push(resource.clone());
            }
        }
    }

    if !report.changed.is_empty() {
        session.set(DISABLED, Field::References(disabled));
        db.update_object(session)?;
        db.commit()?;
    }
    Ok(report)
}
