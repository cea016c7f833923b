// ── Local resource store ──
//
// Typed access to the on-disk repository: one folder per device, one
// subdirectory per resource class. JSON is written pretty-printed with
// sorted keys and a trailing newline, and only when the content changed,
// so an idempotent pull leaves the working copy clean.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shellyops_api::{ComponentKey, Schedule, Webhook};
use thiserror::Error;
use tokio::fs;

use crate::model::{DeviceFile, ScriptMeta, ScriptRecord};
use crate::outcome::ResourceClass;

pub const DEVICE_FILE: &str = "device.yaml";
pub const CONFIGS_DIR: &str = "configs";
pub const SCRIPTS_DIR: &str = "scripts";
pub const SCHEDULES_DIR: &str = "schedules";
pub const WEBHOOKS_DIR: &str = "webhooks";
pub const KVS_DIR: &str = "kvs";
pub const KVS_FILE: &str = "data.json";
pub const VIRTUAL_COMPONENTS_DIR: &str = "virtual-components";
pub const GROUPS_DIR: &str = "groups";

/// Subdirectories created for every device folder.
pub const DEVICE_SUBDIRS: &[&str] = &[
    CONFIGS_DIR,
    SCRIPTS_DIR,
    SCHEDULES_DIR,
    WEBHOOKS_DIR,
    KVS_DIR,
    VIRTUAL_COMPONENTS_DIR,
    GROUPS_DIR,
];

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: invalid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: invalid YAML: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Json { path, .. }
            | Self::Yaml { path, .. }
            | Self::Invalid { path, .. } => path,
        }
    }

    /// File name of the offending record, used as its key in reports.
    pub fn record_key(&self) -> String {
        self.path()
            .file_name()
            .map_or_else(|| self.path().display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// What a conditional write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Updated,
    Unchanged,
}

// ── File helpers ────────────────────────────────────────────────────

/// Write via a sibling temp file and rename, so readers never observe a
/// partially written file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

async fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<WriteStatus, StoreError> {
    let status = match fs::read(path).await {
        Ok(existing) if existing == bytes => return Ok(WriteStatus::Unchanged),
        Ok(_) => WriteStatus::Updated,
        Err(e) if e.kind() == ErrorKind::NotFound => WriteStatus::Created,
        Err(e) => return Err(StoreError::io(path, e)),
    };
    write_atomic(path, bytes).await?;
    Ok(status)
}

fn json_bytes(path: &Path, value: &impl Serialize) -> Result<Vec<u8>, StoreError> {
    let json_err = |source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    };
    // Round-trip through `Value` so object keys come out sorted.
    let value = serde_json::to_value(value).map_err(json_err)?;
    let mut text = serde_json::to_string_pretty(&value).map_err(json_err)?;
    text.push('\n');
    Ok(text.into_bytes())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).await.map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

async fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

/// File names in `dir`, sorted. A missing directory has no entries.
async fn file_names(dir: &Path) -> Result<Vec<String>, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_file {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Parse `<prefix>-<id><suffix>` into its numeric id.
fn record_id(name: &str, prefix: &str, suffix: &str) -> Option<Result<u32, ()>> {
    let stem = name.strip_suffix(suffix)?.strip_prefix(prefix)?.strip_prefix('-')?;
    Some(stem.parse().map_err(|_| ()))
}

// ── Repository ──────────────────────────────────────────────────────

/// The repository root holding every device folder.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Accessor for one device folder (which may not exist yet).
    pub fn device(&self, folder: &str) -> DeviceStore {
        DeviceStore {
            dir: self.root.join(folder),
        }
    }

    /// Rename a device folder. Returns `false` when the source does not
    /// exist, in which case nothing is done.
    pub async fn rename_folder(&self, from: &str, to: &str) -> Result<bool, StoreError> {
        let source = self.root.join(from);
        if !is_dir(&source).await {
            return Ok(false);
        }
        let target = self.root.join(to);
        if fs::metadata(&target).await.is_ok() {
            return Err(StoreError::Invalid {
                path: target,
                reason: "rename target already exists".into(),
            });
        }
        fs::rename(&source, &target)
            .await
            .map_err(|e| StoreError::io(&source, e))?;
        Ok(true)
    }
}

// ── Device folder ───────────────────────────────────────────────────

/// Typed access to one device folder.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    dir: PathBuf,
}

impl DeviceStore {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn exists(&self) -> bool {
        is_dir(&self.dir).await
    }

    /// Create the folder and every class subdirectory.
    pub async fn ensure_layout(&self) -> Result<(), StoreError> {
        for sub in DEVICE_SUBDIRS {
            let path = self.dir.join(sub);
            fs::create_dir_all(&path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
        }
        Ok(())
    }

    /// Whether the folder declares `class` at all. Push skips undeclared
    /// classes rather than treating them as "delete everything remote".
    pub async fn declares(&self, class: ResourceClass) -> bool {
        match class {
            ResourceClass::Configs => is_dir(&self.dir.join(CONFIGS_DIR)).await,
            ResourceClass::Scripts => is_dir(&self.dir.join(SCRIPTS_DIR)).await,
            ResourceClass::Schedules => is_dir(&self.dir.join(SCHEDULES_DIR)).await,
            ResourceClass::Webhooks => is_dir(&self.dir.join(WEBHOOKS_DIR)).await,
            ResourceClass::Kvs => is_file(&self.kvs_path()).await,
            ResourceClass::Components => is_dir(&self.dir.join(VIRTUAL_COMPONENTS_DIR)).await,
        }
    }

    pub async fn write_device_file(&self, file: &DeviceFile) -> Result<WriteStatus, StoreError> {
        let path = self.dir.join(DEVICE_FILE);
        let text = serde_yaml::to_string(file).map_err(|source| StoreError::Yaml {
            path: path.clone(),
            source,
        })?;
        write_if_changed(&path, text.as_bytes()).await
    }

    pub async fn read_device_file(&self) -> Result<DeviceFile, StoreError> {
        let path = self.dir.join(DEVICE_FILE);
        let text = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        serde_yaml::from_str(&text).map_err(|source| StoreError::Yaml { path, source })
    }

    // ── Configs ──────────────────────────────────────────────────────

    /// Every `configs/*.json` file, keyed by the component it names.
    pub async fn list_configs(
        &self,
    ) -> Result<Vec<Result<(ComponentKey, Value), StoreError>>, StoreError> {
        let dir = self.dir.join(CONFIGS_DIR);
        let mut configs = Vec::new();
        for name in file_names(&dir).await? {
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let key = ComponentKey::from_file_stem(stem);
            let path = dir.join(&name);
            configs.push(read_json(&path).await.map(|config| (key, config)));
        }
        Ok(configs)
    }

    pub async fn write_config(
        &self,
        key: &ComponentKey,
        config: &Value,
    ) -> Result<WriteStatus, StoreError> {
        let path = self
            .dir
            .join(CONFIGS_DIR)
            .join(format!("{}.json", key.file_stem()));
        write_if_changed(&path, &json_bytes(&path, config)?).await
    }

    // ── Scripts ──────────────────────────────────────────────────────

    fn script_paths(&self, id: u32) -> (PathBuf, PathBuf) {
        let dir = self.dir.join(SCRIPTS_DIR);
        (
            dir.join(format!("script-{id}.js")),
            dir.join(format!("script-{id}.meta.json")),
        )
    }

    /// Every `scripts/script-<id>.js` with its metadata. A missing
    /// `.meta.json` yields a disabled script named after the file.
    pub async fn list_scripts(&self) -> Result<Vec<Result<ScriptRecord, StoreError>>, StoreError> {
        let dir = self.dir.join(SCRIPTS_DIR);
        let mut scripts = Vec::new();
        for name in file_names(&dir).await? {
            let Some(parsed) = record_id(&name, "script", ".js") else {
                continue;
            };
            let path = dir.join(&name);
            let Ok(id) = parsed else {
                scripts.push(Err(StoreError::Invalid {
                    path,
                    reason: "script file name must be script-<numeric id>.js".into(),
                }));
                continue;
            };
            scripts.push(self.read_script(id).await);
        }
        scripts.sort_by_key(|s| s.as_ref().map_or(0, |r| r.meta.id));
        Ok(scripts)
    }

    async fn read_script(&self, id: u32) -> Result<ScriptRecord, StoreError> {
        let (code_path, meta_path) = self.script_paths(id);
        let code = fs::read_to_string(&code_path)
            .await
            .map_err(|e| StoreError::io(&code_path, e))?;
        let mut meta = if is_file(&meta_path).await {
            read_json::<ScriptMeta>(&meta_path).await?
        } else {
            ScriptMeta {
                id,
                name: format!("script-{id}"),
                enable: false,
            }
        };
        meta.id = id;
        Ok(ScriptRecord { meta, code })
    }

    pub async fn write_script(&self, script: &ScriptRecord) -> Result<WriteStatus, StoreError> {
        let (code_path, meta_path) = self.script_paths(script.meta.id);
        let code = write_if_changed(&code_path, script.code.as_bytes()).await?;
        let meta = write_if_changed(&meta_path, &json_bytes(&meta_path, &script.meta)?).await?;
        Ok(match (code, meta) {
            (WriteStatus::Created, _) => WriteStatus::Created,
            (WriteStatus::Unchanged, WriteStatus::Unchanged) => WriteStatus::Unchanged,
            _ => WriteStatus::Updated,
        })
    }

    pub async fn remove_script(&self, id: u32) -> Result<bool, StoreError> {
        let (code_path, meta_path) = self.script_paths(id);
        let code = remove_if_exists(&code_path).await?;
        let meta = remove_if_exists(&meta_path).await?;
        Ok(code || meta)
    }

    // ── Schedules & webhooks ─────────────────────────────────────────

    pub async fn list_schedules(
        &self,
    ) -> Result<Vec<Result<(u32, Schedule), StoreError>>, StoreError> {
        let mut records = self.list_records::<Schedule>(SCHEDULES_DIR, "schedule").await?;
        for (id, schedule) in records.iter_mut().flatten() {
            schedule.id = Some(*id);
        }
        Ok(records)
    }

    pub async fn write_schedule(&self, id: u32, schedule: &Schedule) -> Result<WriteStatus, StoreError> {
        let mut schedule = schedule.clone();
        schedule.id = Some(id);
        self.write_record(SCHEDULES_DIR, "schedule", id, &schedule).await
    }

    pub async fn remove_schedule(&self, id: u32) -> Result<bool, StoreError> {
        remove_if_exists(&self.record_path(SCHEDULES_DIR, "schedule", id)).await
    }

    pub async fn list_webhooks(
        &self,
    ) -> Result<Vec<Result<(u32, Webhook), StoreError>>, StoreError> {
        let mut records = self.list_records::<Webhook>(WEBHOOKS_DIR, "webhook").await?;
        for (id, hook) in records.iter_mut().flatten() {
            hook.id = Some(*id);
        }
        Ok(records)
    }

    pub async fn write_webhook(&self, id: u32, hook: &Webhook) -> Result<WriteStatus, StoreError> {
        let mut hook = hook.clone();
        hook.id = Some(id);
        self.write_record(WEBHOOKS_DIR, "webhook", id, &hook).await
    }

    pub async fn remove_webhook(&self, id: u32) -> Result<bool, StoreError> {
        remove_if_exists(&self.record_path(WEBHOOKS_DIR, "webhook", id)).await
    }

    /// Ids of the records present on disk for an id-keyed class, including
    /// files whose content fails to parse.
    pub async fn record_ids(&self, class: ResourceClass) -> Result<BTreeSet<u32>, StoreError> {
        let (sub, prefix, suffix) = match class {
            ResourceClass::Scripts => (SCRIPTS_DIR, "script", ".js"),
            ResourceClass::Schedules => (SCHEDULES_DIR, "schedule", ".json"),
            ResourceClass::Webhooks => (WEBHOOKS_DIR, "webhook", ".json"),
            _ => return Ok(BTreeSet::new()),
        };
        Ok(file_names(&self.dir.join(sub))
            .await?
            .iter()
            .filter_map(|name| record_id(name, prefix, suffix))
            .filter_map(Result::ok)
            .collect())
    }

    fn record_path(&self, sub: &str, prefix: &str, id: u32) -> PathBuf {
        self.dir.join(sub).join(format!("{prefix}-{id}.json"))
    }

    async fn list_records<T: DeserializeOwned>(
        &self,
        sub: &str,
        prefix: &str,
    ) -> Result<Vec<Result<(u32, T), StoreError>>, StoreError> {
        let dir = self.dir.join(sub);
        let mut records = Vec::new();
        for name in file_names(&dir).await? {
            let Some(parsed) = record_id(&name, prefix, ".json") else {
                continue;
            };
            let path = dir.join(&name);
            match parsed {
                Ok(id) => records.push(read_json::<T>(&path).await.map(|r| (id, r))),
                Err(()) => records.push(Err(StoreError::Invalid {
                    path,
                    reason: format!("file name must be {prefix}-<numeric id>.json"),
                })),
            }
        }
        records.sort_by_key(|r| r.as_ref().map_or(0, |(id, _)| *id));
        Ok(records)
    }

    async fn write_record(
        &self,
        sub: &str,
        prefix: &str,
        id: u32,
        record: &impl Serialize,
    ) -> Result<WriteStatus, StoreError> {
        let path = self.record_path(sub, prefix, id);
        write_if_changed(&path, &json_bytes(&path, record)?).await
    }

    // ── KVS ──────────────────────────────────────────────────────────

    fn kvs_path(&self) -> PathBuf {
        self.dir.join(KVS_DIR).join(KVS_FILE)
    }

    /// The declared key-value set, or `None` when `kvs/data.json` is absent.
    pub async fn load_kvs(&self) -> Result<Option<Map<String, Value>>, StoreError> {
        let path = self.kvs_path();
        if !is_file(&path).await {
            return Ok(None);
        }
        match read_json::<Value>(&path).await? {
            Value::Object(map) => Ok(Some(map)),
            _ => Err(StoreError::Invalid {
                path,
                reason: "key-value file must contain a JSON object".into(),
            }),
        }
    }

    pub async fn save_kvs(&self, entries: &Map<String, Value>) -> Result<WriteStatus, StoreError> {
        let path = self.kvs_path();
        write_if_changed(&path, &json_bytes(&path, entries)?).await
    }

    // ── Components ───────────────────────────────────────────────────

    pub async fn write_virtual_component(
        &self,
        key: &ComponentKey,
        blob: &Value,
    ) -> Result<WriteStatus, StoreError> {
        let path = self
            .dir
            .join(VIRTUAL_COMPONENTS_DIR)
            .join(format!("{}.json", key.file_stem()));
        write_if_changed(&path, &json_bytes(&path, blob)?).await
    }

    pub async fn write_group(&self, id: u32, blob: &Value) -> Result<WriteStatus, StoreError> {
        let path = self.dir.join(GROUPS_DIR).join(format!("group-{id}.json"));
        write_if_changed(&path, &json_bytes(&path, blob)?).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    async fn device_store() -> (tempfile::TempDir, DeviceStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path()).device("hallway-shelly1-abc");
        store.ensure_layout().await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn layout_declares_directory_classes_but_not_kvs() {
        let (_tmp, store) = device_store().await;
        assert!(store.exists().await);
        assert!(store.declares(ResourceClass::Scripts).await);
        assert!(!store.declares(ResourceClass::Kvs).await);

        store.save_kvs(&Map::new()).await.unwrap();
        assert!(store.declares(ResourceClass::Kvs).await);
    }

    #[tokio::test]
    async fn json_is_sorted_pretty_and_written_only_on_change() {
        let (_tmp, store) = device_store().await;
        let key = ComponentKey::new("switch", Some(0));
        let config = json!({ "name": "Light", "id": 0 });

        assert_eq!(store.write_config(&key, &config).await.unwrap(), WriteStatus::Created);
        assert_eq!(store.write_config(&key, &config).await.unwrap(), WriteStatus::Unchanged);

        let text = std::fs::read_to_string(store.dir().join("configs/switch-0.json")).unwrap();
        assert_eq!(text, "{\n  \"id\": 0,\n  \"name\": \"Light\"\n}\n");

        let configs = store.list_configs().await.unwrap();
        let (read_key, read_config) = configs.into_iter().next().unwrap().unwrap();
        assert_eq!(read_key, key);
        assert_eq!(read_config, config);
    }

    #[tokio::test]
    async fn scripts_round_trip_with_metadata() {
        let (_tmp, store) = device_store().await;
        let script = ScriptRecord {
            meta: ScriptMeta {
                id: 3,
                name: "blink".into(),
                enable: true,
            },
            code: "print('hi');\n".into(),
        };
        assert_eq!(store.write_script(&script).await.unwrap(), WriteStatus::Created);

        let scripts = store.list_scripts().await.unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].as_ref().unwrap(), &script);

        assert!(store.remove_script(3).await.unwrap());
        assert!(store.list_scripts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_record_fails_alone() {
        let (_tmp, store) = device_store().await;
        let schedule: Schedule = serde_json::from_value(json!({
            "enable": true, "timespec": "0 0 6 * * *", "calls": []
        }))
        .unwrap();
        store.write_schedule(1, &schedule).await.unwrap();
        std::fs::write(store.dir().join("schedules/schedule-2.json"), "{ nope").unwrap();
        std::fs::write(store.dir().join("schedules/schedule-x.json"), "{}").unwrap();

        let records = store.list_schedules().await.unwrap();
        assert_eq!(records.len(), 3);
        let ok: Vec<u32> = records.iter().flatten().map(|(id, _)| *id).collect();
        assert_eq!(ok, vec![1]);
        let failed: Vec<String> = records
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(StoreError::record_key)
            .collect();
        assert!(failed.contains(&"schedule-2.json".to_string()));
        assert!(failed.contains(&"schedule-x.json".to_string()));

        let ids = store.record_ids(ResourceClass::Schedules).await.unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn rename_refuses_to_clobber() {
        let tmp = tempfile::tempdir().unwrap();
        let local = LocalStore::new(tmp.path());
        local.device("old-x").ensure_layout().await.unwrap();
        local.device("taken-x").ensure_layout().await.unwrap();

        assert!(local.rename_folder("old-x", "taken-x").await.is_err());
        assert!(local.rename_folder("old-x", "new-x").await.unwrap());
        assert!(!local.rename_folder("missing-x", "other-x").await.unwrap());
        assert!(local.device("new-x").exists().await);
    }
}
