//! On-disk file shapes.
//!
//! The mempool shard of every file is a JSON object keyed by txid. Entries
//! are written in insertion order and read back in file order, so a restore
//! keeps the projection tie-break.

use serde::{Deserialize, Serialize};
use shared_types::{ExtendedBlock, ExtendedTransaction};

/// `cache.json`: chain history plus the first mempool shard.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PrimaryFile {
    #[serde(default)]
    pub blocks: Vec<ExtendedBlock>,
    #[serde(default, with = "mempool_shard")]
    pub mempool: Vec<ExtendedTransaction>,
}

/// `cache{n}.json`: one further mempool shard.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SidecarFile {
    #[serde(default, with = "mempool_shard")]
    pub mempool: Vec<ExtendedTransaction>,
}

mod mempool_shard {
    use serde::de::{MapAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use shared_types::{ExtendedTransaction, Txid};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        transactions: &[ExtendedTransaction],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(transactions.iter().map(|tx| (&tx.txid, tx)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ExtendedTransaction>, D::Error> {
        deserializer.deserialize_map(ShardVisitor)
    }

    struct ShardVisitor;

    impl<'de> Visitor<'de> for ShardVisitor {
        type Value = Vec<ExtendedTransaction>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of txid to transaction")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut transactions = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((txid, mut tx)) = map.next_entry::<Txid, ExtendedTransaction>()? {
                if tx.txid.is_empty() {
                    tx.txid = txid;
                }
                transactions.push(tx);
            }
            Ok(transactions)
        }
    }
}
