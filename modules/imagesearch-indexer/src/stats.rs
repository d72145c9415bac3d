use tracing::info;

/// Counters for the partition reduce stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub keys: u64,
    pub paired_keys: u64,
    pub image_only_keys: u64,
    pub page_only_keys: u64,
    pub merged_records: u64,
    pub documents: u64,
    pub inlinks_applied: u64,
    /// Inlinks whose target key had no document in this run.
    pub orphan_inlinks: u64,
    /// New inlinks rejected by a full edge map.
    pub capped_inlinks: u64,
    pub unexpected_records: u64,
}

impl PartitionStats {
    pub fn add(&mut self, other: &PartitionStats) {
        self.keys += other.keys;
        self.paired_keys += other.paired_keys;
        self.image_only_keys += other.image_only_keys;
        self.page_only_keys += other.page_only_keys;
        self.merged_records += other.merged_records;
        self.documents += other.documents;
        self.inlinks_applied += other.inlinks_applied;
        self.orphan_inlinks += other.orphan_inlinks;
        self.capped_inlinks += other.capped_inlinks;
        self.unexpected_records += other.unexpected_records;
    }

    pub fn log(&self) {
        info!(
            keys = self.keys,
            paired = self.paired_keys,
            image_only = self.image_only_keys,
            page_only = self.page_only_keys,
            merged_records = self.merged_records,
            documents = self.documents,
            inlinks_applied = self.inlinks_applied,
            orphan_inlinks = self.orphan_inlinks,
            capped_inlinks = self.capped_inlinks,
            "Partition stage finished"
        );
    }
}

/// Counters for the digest re-merge stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestStats {
    pub groups: u64,
    pub image_records_in: u64,
    pub documents_in: u64,
    pub emitted: u64,
    pub unexpected_records: u64,
}

impl DigestStats {
    pub fn add(&mut self, other: &DigestStats) {
        self.groups += other.groups;
        self.image_records_in += other.image_records_in;
        self.documents_in += other.documents_in;
        self.emitted += other.emitted;
        self.unexpected_records += other.unexpected_records;
    }

    pub fn log(&self) {
        info!(
            groups = self.groups,
            image_records_in = self.image_records_in,
            documents_in = self.documents_in,
            emitted = self.emitted,
            "Digest stage finished"
        );
    }
}
