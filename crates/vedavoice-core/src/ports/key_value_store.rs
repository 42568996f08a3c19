//! DurableKeyValueStore port - 永続化先の抽象化
//!
//! ブラウザの localStorage に相当。キュー全体を 1 つのキーに丸ごと書き込む。
//!
//! # 要件
//! - プロセス再起動後も値が残る
//! - `set` は値全体をアトミックに上書きする（途中状態が読まれない）

use crate::error::StoreError;

/// DurableKeyValueStore は文字列値を key 単位で保存
pub trait DurableKeyValueStore: Send + Sync {
    /// 値を読む（未設定なら `None`）
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 値を丸ごと上書きする
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
