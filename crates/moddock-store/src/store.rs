//! JSON-file store.
//!
//! The whole dataset is one JSON file, cached in memory behind a mutex.
//! Every mutation takes an exclusive lock on a sibling `.lock` file, reloads
//! the document from disk, and runs against that fresh copy; the copy is
//! written to a temporary file, renamed over the store file, and only then
//! swapped into the cache. Several processes can therefore share one store
//! without losing each other's writes, and a failing mutation changes
//! neither the file nor memory. Reads reload the file too; the rename keeps
//! them from ever seeing a half-written document.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use moddock_common::error::{ModdockError, Result};
use moddock_common::filelock::FileLock;
use moddock_common::settings::ServerSettings;
use moddock_common::types::{PlaysetId, ProjectId, ResolvedMod, ServerId};
use serde::{Deserialize, Serialize};

use crate::models::{ModRecord, Playset, PlaysetMod, ResolvedServerMod, Server};

/// Serialized store document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreData {
    servers: Vec<Server>,
    server_mods: Vec<ResolvedServerMod>,
    playsets: Vec<Playset>,
    mods: Vec<ModRecord>,
    playset_mods: Vec<PlaysetMod>,
}

impl StoreData {
    fn server(&self, id: &ServerId) -> Result<&Server> {
        self.servers
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| ModdockError::not_found("server", id))
    }

    fn server_mut(&mut self, id: &ServerId) -> Result<&mut Server> {
        self.servers
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| ModdockError::not_found("server", id))
    }

    fn playset(&self, id: &PlaysetId) -> Result<&Playset> {
        self.playsets
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| ModdockError::not_found("playset", id))
    }

    /// Deletes every mod no playset references any more.
    fn collect_orphan_mods(&mut self) -> usize {
        let reachable: HashSet<&ProjectId> =
            self.playset_mods.iter().map(|pm| &pm.project_id).collect();
        let orphans: HashSet<ProjectId> = self
            .mods
            .iter()
            .filter(|m| !reachable.contains(&m.project_id))
            .map(|m| m.project_id.clone())
            .collect();
        self.mods.retain(|m| !orphans.contains(&m.project_id));
        orphans.len()
    }
}

fn load(path: &Path) -> Result<StoreData> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
        Err(e) => Err(ModdockError::io(path, e)),
    }
}

/// File-backed store of servers, resolved mods, playsets, and mods.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    lock_path: PathBuf,
    data: Mutex<StoreData>,
}

impl Store {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ModdockError::io(parent, e))?;
        }
        let data = load(&path)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(Self {
            lock_path: path.with_extension("lock"),
            path,
            data: Mutex::new(data),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&StoreData) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        *guard = load(&self.path)?;
        f(&guard)
    }

    /// Applies `f` to the current file contents under the file lock,
    /// persists the result, then caches it.
    fn update<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let _file = FileLock::acquire(&self.lock_path)?;
        let mut draft = load(&self.path)?;
        let value = f(&mut draft)?;
        self.persist(&draft)?;
        *guard = draft;
        Ok(value)
    }

    fn persist(&self, data: &StoreData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| ModdockError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| ModdockError::io(&self.path, e))
    }

    // Servers

    /// Creates a server record.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the settings are invalid, or an I/O error.
    pub fn create_server(&self, name: impl Into<String>, settings: ServerSettings) -> Result<Server> {
        settings.validate()?;
        let server = Server {
            id: ServerId::generate(),
            name: name.into(),
            settings,
            playset_id: None,
            created_at: Utc::now(),
        };
        self.update(|data| {
            data.servers.push(server.clone());
            Ok(())
        })?;
        tracing::info!(server_id = %server.id, name = %server.name, "server created");
        Ok(server)
    }

    /// Fetches a server.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server does not exist.
    pub fn get_server(&self, id: &ServerId) -> Result<Server> {
        self.read(|data| data.server(id).cloned())
    }

    /// Lists all servers, oldest first.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for symmetry with mutations.
    pub fn list_servers(&self) -> Result<Vec<Server>> {
        self.read(|data| {
            let mut servers = data.servers.clone();
            servers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(servers)
        })
    }

    /// Replaces a server's settings.
    ///
    /// Changing the loader or game version invalidates every resolved mod,
    /// so those rows are removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server does not exist, or `Config` if the
    /// settings are invalid.
    pub fn update_settings(&self, id: &ServerId, settings: ServerSettings) -> Result<Server> {
        settings.validate()?;
        let (server, retargeted) = self.update(|data| {
            let server = data.server_mut(id)?;
            let retargeted = server.settings.loader != settings.loader
                || server.settings.game_version != settings.game_version;
            server.settings = settings;
            let server = server.clone();
            if retargeted {
                data.server_mods.retain(|m| &m.server_id != id);
            }
            Ok((server, retargeted))
        })?;
        tracing::info!(server_id = %id, retargeted, "server settings updated");
        Ok(server)
    }

    /// Records the playset most recently attached to a server.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server or playset does not exist.
    pub fn set_server_playset(&self, id: &ServerId, playset: &PlaysetId) -> Result<()> {
        self.update(|data| {
            let _ = data.playset(playset)?;
            data.server_mut(id)?.playset_id = Some(playset.clone());
            Ok(())
        })
    }

    /// Deletes a server and its resolved mods.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server does not exist.
    pub fn delete_server(&self, id: &ServerId) -> Result<()> {
        self.update(|data| {
            let _ = data.server(id)?;
            data.servers.retain(|s| &s.id != id);
            data.server_mods.retain(|m| &m.server_id != id);
            Ok(())
        })?;
        tracing::info!(server_id = %id, "server deleted");
        Ok(())
    }

    // Resolved mods

    /// Stores the rows of a resolution not yet present for the server.
    ///
    /// Rows are unique per (server, project id): a project already recorded
    /// keeps its existing row. Either every new row is stored or none is.
    /// Returns the rows actually added.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server does not exist, or an I/O error.
    pub fn record_resolution(
        &self,
        server_id: &ServerId,
        resolved: &[ResolvedMod],
    ) -> Result<Vec<ResolvedMod>> {
        let added = self.update(|data| {
            let _ = data.server(server_id)?;
            let mut present: HashSet<ProjectId> = data
                .server_mods
                .iter()
                .filter(|m| &m.server_id == server_id)
                .map(|m| m.resolved.project_id.clone())
                .collect();
            let mut added = Vec::new();
            for m in resolved {
                if present.insert(m.project_id.clone()) {
                    data.server_mods.push(ResolvedServerMod {
                        server_id: server_id.clone(),
                        resolved: m.clone(),
                    });
                    added.push(m.clone());
                }
            }
            Ok(added)
        })?;
        tracing::info!(
            server_id = %server_id,
            offered = resolved.len(),
            added = added.len(),
            "resolution recorded"
        );
        Ok(added)
    }

    /// Resolved mods of a server, in the order they were recorded.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server does not exist.
    pub fn server_mods(&self, server_id: &ServerId) -> Result<Vec<ResolvedMod>> {
        self.read(|data| {
            let _ = data.server(server_id)?;
            Ok(data
                .server_mods
                .iter()
                .filter(|m| &m.server_id == server_id)
                .map(|m| m.resolved.clone())
                .collect())
        })
    }

    /// Project ids already resolved for a server.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the server does not exist.
    pub fn known_project_ids(&self, server_id: &ServerId) -> Result<Vec<ProjectId>> {
        Ok(self
            .server_mods(server_id)?
            .into_iter()
            .map(|m| m.project_id)
            .collect())
    }

    // Playsets

    /// Creates an empty playset.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the store cannot be written.
    pub fn create_playset(&self, name: impl Into<String>) -> Result<Playset> {
        let playset = Playset {
            id: PlaysetId::generate(),
            name: name.into(),
            created_at: Utc::now(),
        };
        self.update(|data| {
            data.playsets.push(playset.clone());
            Ok(())
        })?;
        tracing::info!(playset_id = %playset.id, name = %playset.name, "playset created");
        Ok(playset)
    }

    /// Fetches a playset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not exist.
    pub fn get_playset(&self, id: &PlaysetId) -> Result<Playset> {
        self.read(|data| data.playset(id).cloned())
    }

    /// Lists all playsets, oldest first.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for symmetry with mutations.
    pub fn list_playsets(&self) -> Result<Vec<Playset>> {
        self.read(|data| {
            let mut playsets = data.playsets.clone();
            playsets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(playsets)
        })
    }

    /// Mods of a playset, sorted by project id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not exist.
    pub fn playset_mods(&self, id: &PlaysetId) -> Result<Vec<ModRecord>> {
        self.read(|data| {
            let _ = data.playset(id)?;
            let members: HashSet<&ProjectId> = data
                .playset_mods
                .iter()
                .filter(|pm| &pm.playset_id == id)
                .map(|pm| &pm.project_id)
                .collect();
            let mut mods: Vec<ModRecord> = data
                .mods
                .iter()
                .filter(|m| members.contains(&m.project_id))
                .cloned()
                .collect();
            mods.sort_by(|a, b| a.project_id.cmp(&b.project_id));
            Ok(mods)
        })
    }

    /// Project ids of a playset's mods, sorted.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not exist.
    pub fn playset_project_ids(&self, id: &PlaysetId) -> Result<Vec<ProjectId>> {
        Ok(self
            .playset_mods(id)?
            .into_iter()
            .map(|m| m.project_id)
            .collect())
    }

    /// Adds mods to a playset, creating shared mod records as needed.
    ///
    /// Mods already in the playset are left alone; an existing mod record
    /// gets its title refreshed. Returns the number of new memberships.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not exist.
    pub fn add_mods_to_playset(&self, id: &PlaysetId, mods: &[ModRecord]) -> Result<usize> {
        let linked = self.update(|data| {
            let _ = data.playset(id)?;
            let mut linked = 0;
            for m in mods {
                match data.mods.iter_mut().find(|r| r.project_id == m.project_id) {
                    Some(record) => record.title.clone_from(&m.title),
                    None => data.mods.push(m.clone()),
                }
                let member = data
                    .playset_mods
                    .iter()
                    .any(|pm| &pm.playset_id == id && pm.project_id == m.project_id);
                if !member {
                    data.playset_mods.push(PlaysetMod {
                        playset_id: id.clone(),
                        project_id: m.project_id.clone(),
                    });
                    linked += 1;
                }
            }
            Ok(linked)
        })?;
        tracing::info!(playset_id = %id, linked, "mods added to playset");
        Ok(linked)
    }

    /// Removes one mod from a playset, deleting it if no playset uses it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not exist or does not contain
    /// the mod.
    pub fn remove_mod_from_playset(&self, id: &PlaysetId, project: &ProjectId) -> Result<()> {
        self.update(|data| {
            let _ = data.playset(id)?;
            let before = data.playset_mods.len();
            data.playset_mods
                .retain(|pm| !(&pm.playset_id == id && &pm.project_id == project));
            if data.playset_mods.len() == before {
                return Err(ModdockError::not_found("playset mod", project));
            }
            let _ = data.collect_orphan_mods();
            Ok(())
        })
    }

    /// Deletes a playset and every mod left without a playset.
    ///
    /// Servers that had the playset attached keep their resolved mods.
    /// Returns the number of mods collected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the playset does not exist.
    pub fn delete_playset(&self, id: &PlaysetId) -> Result<usize> {
        let collected = self.update(|data| {
            let _ = data.playset(id)?;
            data.playsets.retain(|p| &p.id != id);
            data.playset_mods.retain(|pm| &pm.playset_id != id);
            for server in &mut data.servers {
                if server.playset_id.as_ref() == Some(id) {
                    server.playset_id = None;
                }
            }
            Ok(data.collect_orphan_mods())
        })?;
        tracing::info!(playset_id = %id, collected, "playset deleted");
        Ok(collected)
    }

    /// Every shared mod record, sorted by project id.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for symmetry with mutations.
    pub fn list_mods(&self) -> Result<Vec<ModRecord>> {
        self.read(|data| {
            let mut mods = data.mods.clone();
            mods.sort_by(|a, b| a.project_id.cmp(&b.project_id));
            Ok(mods)
        })
    }
}
