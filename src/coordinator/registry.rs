//! Group registry
//!
//! Authoritative mapping of servers and tables to groups. Every server and
//! every table belongs to exactly one group; identities that were never
//! placed explicitly belong to [`DEFAULT_GROUP`].
//!
//! All mutations run under a single write lock and validate every input
//! before touching state, so a failed call leaves the registry unchanged.

use crate::common::utils::{validate_group_name, validate_table_name};
use crate::common::{Result, ServerId};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Name of the group that can never be removed
pub const DEFAULT_GROUP: &str = "default";

/// A named group of servers and tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    #[serde(default)]
    pub servers: BTreeSet<ServerId>,
    #[serde(default)]
    pub tables: BTreeSet<String>,
}

impl GroupInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers: BTreeSet::new(),
            tables: BTreeSet::new(),
        }
    }

    pub fn contains_server(&self, server: &ServerId) -> bool {
        self.servers.contains(server)
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_GROUP
    }
}

/// Outcome of moving one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMove {
    pub server: ServerId,
    pub from: String,
    pub to: String,
}

impl ServerMove {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Outcome of moving one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMove {
    pub table: String,
    pub from: String,
    pub to: String,
}

impl TableMove {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug)]
struct RegistryState {
    groups: BTreeMap<String, GroupInfo>,
    /// Tracked servers only; untracked servers fall back to default
    server_index: HashMap<ServerId, String>,
    table_index: HashMap<String, String>,
}

impl RegistryState {
    fn empty() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(DEFAULT_GROUP.to_string(), GroupInfo::new(DEFAULT_GROUP));
        Self {
            groups,
            server_index: HashMap::new(),
            table_index: HashMap::new(),
        }
    }

    fn group_name_of_server(&self, server: &ServerId) -> &str {
        self.server_index
            .get(server)
            .map(String::as_str)
            .unwrap_or(DEFAULT_GROUP)
    }

    fn group_name_of_table(&self, table: &str) -> &str {
        self.table_index
            .get(table)
            .map(String::as_str)
            .unwrap_or(DEFAULT_GROUP)
    }

    fn group(&self, name: &str) -> Result<&GroupInfo> {
        self.groups.get(name).ok_or_else(|| {
            crate::Error::Internal(format!("index references missing group '{}'", name))
        })
    }

    fn require_group(&self, name: &str) -> Result<()> {
        if self.groups.contains_key(name) {
            Ok(())
        } else {
            Err(crate::Error::NotFound(format!("group '{}'", name)))
        }
    }
}

/// Thread-safe group registry
#[derive(Debug)]
pub struct GroupRegistry {
    state: RwLock<RegistryState>,
}

impl GroupRegistry {
    /// Registry holding only the (empty) default group
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::empty()),
        }
    }

    /// Rebuild a registry from a snapshot.
    ///
    /// The default group is added when absent. Duplicate names and servers or
    /// tables claimed by more than one group are rejected.
    pub fn from_groups(groups: impl IntoIterator<Item = GroupInfo>) -> Result<Self> {
        let mut state = RegistryState::empty();
        let mut seen_default = false;

        for group in groups {
            validate_group_name(&group.name)?;
            if group.is_default() {
                if seen_default {
                    return Err(crate::Error::InvalidState(format!(
                        "group '{}' appears twice",
                        DEFAULT_GROUP
                    )));
                }
                seen_default = true;
            } else if state.groups.contains_key(&group.name) {
                return Err(crate::Error::InvalidState(format!(
                    "group '{}' appears twice",
                    group.name
                )));
            }

            for server in &group.servers {
                if let Some(owner) = state.server_index.insert(server.clone(), group.name.clone()) {
                    return Err(crate::Error::InvalidState(format!(
                        "server {} belongs to both '{}' and '{}'",
                        server, owner, group.name
                    )));
                }
            }
            for table in &group.tables {
                validate_table_name(table)?;
                if let Some(owner) = state.table_index.insert(table.clone(), group.name.clone()) {
                    return Err(crate::Error::InvalidState(format!(
                        "table {} belongs to both '{}' and '{}'",
                        table, owner, group.name
                    )));
                }
            }

            state.groups.insert(group.name.clone(), group);
        }

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Consistent read view for evaluating many lookups at once
    pub fn read(&self) -> RegistryView<'_> {
        RegistryView {
            state: self.state.read(),
        }
    }

    // === Group operations ===

    pub fn create_group(&self, name: &str) -> Result<()> {
        validate_group_name(name)?;

        let mut state = self.state.write();
        if state.groups.contains_key(name) {
            return Err(crate::Error::AlreadyExists(format!("group '{}'", name)));
        }
        state.groups.insert(name.to_string(), GroupInfo::new(name));

        tracing::info!(group = name, "Created group");
        Ok(())
    }

    /// Remove an empty group. Servers are never moved implicitly.
    pub fn delete_group(&self, name: &str) -> Result<GroupInfo> {
        if name == DEFAULT_GROUP {
            return Err(crate::Error::InvalidState(format!(
                "group '{}' cannot be removed",
                DEFAULT_GROUP
            )));
        }

        let mut state = self.state.write();
        let group = state
            .groups
            .get(name)
            .ok_or_else(|| crate::Error::NotFound(format!("group '{}'", name)))?;

        if !group.tables.is_empty() {
            return Err(crate::Error::InvalidState(format!(
                "group '{}' still has {} table(s)",
                name,
                group.tables.len()
            )));
        }
        if !group.servers.is_empty() {
            return Err(crate::Error::InvalidState(format!(
                "group '{}' still has {} server(s); move them first",
                name,
                group.servers.len()
            )));
        }

        let removed = state
            .groups
            .remove(name)
            .ok_or_else(|| crate::Error::Internal(format!("group '{}' vanished", name)))?;

        tracing::info!(group = name, "Removed group");
        Ok(removed)
    }

    pub fn get_group(&self, name: &str) -> Result<GroupInfo> {
        self.state
            .read()
            .groups
            .get(name)
            .cloned()
            .ok_or_else(|| crate::Error::NotFound(format!("group '{}'", name)))
    }

    pub fn group_of_server(&self, server: &ServerId) -> Result<GroupInfo> {
        let state = self.state.read();
        state.group(state.group_name_of_server(server)).cloned()
    }

    pub fn group_of_table(&self, table: &str) -> Result<GroupInfo> {
        let state = self.state.read();
        state.group(state.group_name_of_table(table)).cloned()
    }

    pub fn tables_of_group(&self, name: &str) -> Result<BTreeSet<String>> {
        Ok(self.get_group(name)?.tables)
    }

    /// Snapshot of all groups, default first, then by name
    pub fn list_groups(&self) -> Vec<GroupInfo> {
        let state = self.state.read();
        let mut groups = Vec::with_capacity(state.groups.len());
        if let Some(default) = state.groups.get(DEFAULT_GROUP) {
            groups.push(default.clone());
        }
        groups.extend(
            state
                .groups
                .values()
                .filter(|g| !g.is_default())
                .cloned(),
        );
        groups
    }

    /// Same content as [`list_groups`](Self::list_groups), for persistence
    pub fn snapshot(&self) -> Vec<GroupInfo> {
        self.list_groups()
    }

    // === Server operations ===

    pub fn is_tracked_server(&self, server: &ServerId) -> bool {
        self.state.read().server_index.contains_key(server)
    }

    /// Record first-seen servers as members of the default group.
    /// Returns how many servers were newly tracked.
    pub fn track_servers<'a>(&self, servers: impl IntoIterator<Item = &'a ServerId>) -> usize {
        let unseen: Vec<ServerId> = {
            let state = self.state.read();
            servers
                .into_iter()
                .filter(|s| !state.server_index.contains_key(*s))
                .cloned()
                .collect()
        };
        if unseen.is_empty() {
            return 0;
        }

        let mut state = self.state.write();
        let mut added = 0;
        for server in unseen {
            // re-check: another writer may have placed it meanwhile
            if state.server_index.contains_key(&server) {
                continue;
            }
            state
                .server_index
                .insert(server.clone(), DEFAULT_GROUP.to_string());
            if let Some(default) = state.groups.get_mut(DEFAULT_GROUP) {
                default.servers.insert(server);
            }
            added += 1;
        }
        added
    }

    /// Move servers into `target`, all or nothing.
    pub fn move_servers(&self, servers: &[ServerId], target: &str) -> Result<Vec<ServerMove>> {
        let mut state = self.state.write();
        state.require_group(target)?;

        let moves: Vec<ServerMove> = servers
            .iter()
            .map(|server| ServerMove {
                server: server.clone(),
                from: state.group_name_of_server(server).to_string(),
                to: target.to_string(),
            })
            .collect();
        for mv in &moves {
            state.group(&mv.from)?;
        }

        for mv in moves.iter().filter(|mv| !mv.is_noop()) {
            if let Some(source) = state.groups.get_mut(&mv.from) {
                source.servers.remove(&mv.server);
            }
            if let Some(dest) = state.groups.get_mut(target) {
                dest.servers.insert(mv.server.clone());
            }
            state
                .server_index
                .insert(mv.server.clone(), target.to_string());
        }
        // untracked servers already in default still need to be listed there
        for mv in moves.iter().filter(|mv| mv.is_noop()) {
            if !state.server_index.contains_key(&mv.server) {
                state
                    .server_index
                    .insert(mv.server.clone(), target.to_string());
                if let Some(dest) = state.groups.get_mut(target) {
                    dest.servers.insert(mv.server.clone());
                }
            }
        }

        Ok(moves)
    }

    // === Table operations ===

    /// Record first-seen tables as members of the default group.
    /// Returns how many tables were newly tracked.
    pub fn track_tables<'a>(&self, tables: impl IntoIterator<Item = &'a str>) -> usize {
        let unseen: BTreeSet<String> = {
            let state = self.state.read();
            tables
                .into_iter()
                .filter(|t| !t.is_empty() && !state.table_index.contains_key(*t))
                .map(str::to_string)
                .collect()
        };
        if unseen.is_empty() {
            return 0;
        }

        let mut state = self.state.write();
        let mut added = 0;
        for table in unseen {
            if state.table_index.contains_key(&table) {
                continue;
            }
            state
                .table_index
                .insert(table.clone(), DEFAULT_GROUP.to_string());
            if let Some(default) = state.groups.get_mut(DEFAULT_GROUP) {
                default.tables.insert(table);
            }
            added += 1;
        }
        added
    }

    /// Move tables into `target`, all or nothing.
    pub fn move_tables(&self, tables: &[String], target: &str) -> Result<Vec<TableMove>> {
        for table in tables {
            validate_table_name(table)?;
        }

        let mut state = self.state.write();
        state.require_group(target)?;

        let moves: Vec<TableMove> = tables
            .iter()
            .map(|table| TableMove {
                table: table.clone(),
                from: state.group_name_of_table(table).to_string(),
                to: target.to_string(),
            })
            .collect();
        for mv in &moves {
            state.group(&mv.from)?;
        }

        for mv in moves.iter().filter(|mv| !mv.is_noop()) {
            if let Some(source) = state.groups.get_mut(&mv.from) {
                source.tables.remove(&mv.table);
            }
            if let Some(dest) = state.groups.get_mut(target) {
                dest.tables.insert(mv.table.clone());
            }
            state.table_index.insert(mv.table.clone(), target.to_string());
        }
        for mv in moves.iter().filter(|mv| mv.is_noop()) {
            if !state.table_index.contains_key(&mv.table) {
                state.table_index.insert(mv.table.clone(), target.to_string());
                if let Some(dest) = state.groups.get_mut(target) {
                    dest.tables.insert(mv.table.clone());
                }
            }
        }

        Ok(moves)
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-locked view of the registry
pub struct RegistryView<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
}

impl RegistryView<'_> {
    pub fn group_name_of_server(&self, server: &ServerId) -> &str {
        self.state.group_name_of_server(server)
    }

    pub fn group_name_of_table(&self, table: &str) -> &str {
        self.state.group_name_of_table(table)
    }

    /// All tracked servers with their group
    pub fn tracked_servers(&self) -> impl Iterator<Item = (&ServerId, &str)> + '_ {
        self.state
            .server_index
            .iter()
            .map(|(server, group)| (server, group.as_str()))
    }
}
