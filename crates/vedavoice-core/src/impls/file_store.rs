//! FileStore - ディレクトリ配下に key ごとの JSON ファイルを置く DurableKeyValueStore
//!
//! # アトミック上書き
//! `<key>.json.tmp` に書いてから `rename` する。同一ファイルシステム上の
//! rename は置き換えがアトミックなので、読み手は旧値か新値のどちらかしか見ない。
//! rename の前に `sync_all` して、電源断後に空ファイルが残らないようにする。
//!
//! # 単一ライター
//! キューは in-memory が正本で、変更のたびにファイル全体を書き戻す。
//! 2 つのプロセスが同じディレクトリに書くと互いの変更を消してしまうので、
//! `open` は `<dir>/.lock` に排他 advisory lock を取り、取れなければ失敗する。
//! ロックは FileStore（とその clone）がすべて drop されたときに解放される。

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;

use crate::error::StoreError;
use crate::ports::DurableKeyValueStore;

const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    _lock: Arc<File>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`, taking the
    /// directory's writer lock.
    ///
    /// Fails with `StoreError::Locked` while another FileStore holds it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let io_err = |source: std::io::Error| StoreError::Io {
            key: dir.display().to_string(),
            source,
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(io_err)?;
        match FileExt::try_lock_exclusive(&lock) {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                return Err(StoreError::Locked {
                    dir: dir.display().to_string(),
                });
            }
            Err(e) => return Err(io_err(e)),
        }
        tracing::debug!(dir = %dir.display(), "file store opened");

        Ok(Self {
            dir,
            _lock: Arc::new(lock),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Characters outside `[A-Za-z0-9._-]` become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl DurableKeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let io_err = |source: std::io::Error| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(value.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, &path).map_err(io_err)?;
        Ok(())
    }
}
