use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use oksconf_config::Config;
use oksconf_dal::{DalObject, Identity};
use oksconf_database::Database;

use crate::find_session;

/// Lists the ids of the applications run by a session (the first session, if none is named)
///
/// The session's segment tree is walked depth first; the applications of child segments are
/// listed before those of their parent.
pub fn session_apps(
    db: &impl Database,
    config: &Config,
    session: Option<&str>,
) -> Result<Vec<String>> {
    let session = find_session(db, config, session)?;
    segment_tree_apps(db, session)
}

/// Lists the applications of every session of the database, by session id
pub fn database_apps(db: &impl Database, config: &Config) -> Result<BTreeMap<String, Vec<String>>> {
    let sessions = db.objects_of_class(config.session_class())?;
    if sessions.is_empty() {
        tracing::warn!("Could not find any {} in {}", config.session_class(), db.root());
    }
    sessions
        .into_iter()
        .map(|session| Ok((session.id().to_owned(), segment_tree_apps(db, session)?)))
        .collect()
}

fn segment_tree_apps(db: &impl Database, session: &DalObject) -> Result<Vec<String>> {
    let mut apps = Vec::new();
    match session.reference("segment") {
        Some(segment) => {
            let mut visited = HashSet::new();
            segment_apps(db, segment, &mut apps, &mut visited)?;
        }
        None => tracing::warn!("Session {} has no segment", session.id()),
    }
    Ok(apps)
}

fn segment_apps<'d>(
    db: &'d impl Database,
    segment: &Identity,
    apps: &mut Vec<String>,
    visited: &mut HashSet<&'d Identity>,
) -> Result<()> {
    let segment = db.get(&segment.class, &segment.id)?;
    if !visited.insert(segment.identity()) {
        tracing::warn!("Segment {} is reached more than once", segment.id());
        return Ok(());
    }
    for child in segment.references("segments") {
        segment_apps(db, child, apps, visited)?;
    }
    apps.extend(
        segment
            .references("applications")
            .iter()
            .map(|app| app.id.clone()),
    );
    Ok(())
}
