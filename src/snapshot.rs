//! スナップショットのエクスポート/インポート機能。
//!
//! ## バージョニング方針
//!
//! - `SNAPSHOT_VERSION`: 現在のスナップショット形式バージョン。フィールド
//!   追加時にインクリメントする。
//! - `MIN_COMPATIBLE_VERSION`: 互換性を維持できる最小バージョン。
//!   新フィールドの追加のみの場合はこの値を変えない（旧データを維持できる）。
//!   既存フィールドの意味変更や削除など破壊的変更を行った場合のみ
//!   インクリメントする。
//!
//! 旧バージョンのスナップショットは、`MIN_COMPATIBLE_VERSION` 以上であれば
//! 不足フィールドにデフォルト値を補完して読み込む。インポートした記録は
//! 必ずバリデータを通してから使う（エクスポート元が検証済みとは限らない）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::progress::ProgressRecord;
use crate::validate::{check_gems, validate, GemFlag, Issue};

/// 現在のスナップショット形式バージョン。
pub const SNAPSHOT_VERSION: u32 = 2;

/// 互換性を維持できる最小バージョン。
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot version {found} is older than the minimum supported {min}")]
    Incompatible { found: u32, min: u32 },
}

/// シリアライズ用のスナップショット構造体。UI の一時状態は含まない。
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    progress: ProgressRecord,
    #[serde(default)]
    gems: i64,
}

/// What an accepted snapshot produced after repair.
#[derive(Debug)]
pub struct Imported {
    pub record: ProgressRecord,
    pub gems: i64,
    pub issues: Vec<Issue>,
    pub gem_flags: Vec<GemFlag>,
}

/// Serialize the current state as a portable JSON snapshot.
pub fn export(record: &ProgressRecord, gems: i64) -> Result<String, SnapshotError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        progress: record.clone(),
        gems,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Parse a snapshot, defaulting missing fields and repairing the record on
/// the way in. Snapshots below [`MIN_COMPATIBLE_VERSION`] are rejected so
/// the caller can fall back to a fresh record.
pub fn import(json: &str) -> Result<Imported, SnapshotError> {
    let snapshot: Snapshot = serde_json::from_str(json)?;
    if snapshot.version < MIN_COMPATIBLE_VERSION {
        return Err(SnapshotError::Incompatible {
            found: snapshot.version,
            min: MIN_COMPATIBLE_VERSION,
        });
    }
    let (record, issues) = validate(&snapshot.progress);
    let (gems, gem_flags) = check_gems(snapshot.gems);
    Ok(Imported {
        record,
        gems,
        issues,
        gem_flags,
    })
}
