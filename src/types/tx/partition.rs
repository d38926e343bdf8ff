#![forbid(unsafe_code)]

use super::Envelope;

impl Envelope {
    /// Routing key pinning every transaction of one sender on one chain to the same partition.
    ///
    /// Empty when the sender or the chain id is unknown.
    pub fn partition_key(&self) -> String {
        let (Some(_), Some(chain_id)) = (self.tx.from, self.chain.chain_id.as_ref()) else {
            return String::new();
        };
        let from = self.from_checksum();

        if self.is_eea_private() {
            if !self.private.privacy_group_id.is_empty() {
                return format!("{from}@orion-{}@{chain_id}", self.private.privacy_group_id);
            }
            if !self.private.private_for.is_empty() {
                let mut participants = self.private.private_for.clone();
                participants.push(self.private.private_from.clone());
                participants.sort();
                let digest = md5::compute(participants.join("-"));
                return format!("{from}@orion-{digest:x}@{chain_id}");
            }
        }

        format!("{from}@{chain_id}")
    }
}
