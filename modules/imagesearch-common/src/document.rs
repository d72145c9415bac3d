//! Document aggregates and the bounded hyperlink graph attached to them.
//!
//! A `DocumentAggregate` accumulates everything known about one logical
//! document across captures. Multi-valued fields are sets; the two edge maps
//! key a mutable `LinkStats` payload by an immutable `(source, target)` pair.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::surt::{authority, canonicalize, has_identity};
use crate::text::{host_and_protocol, url_tokens};
use crate::timestamp::CaptureTime;
use crate::types::insert_non_empty;

pub const MAX_OUTLINKS: usize = 1000;
pub const MAX_INLINKS: usize = 1000;

// ---------------------------------------------------------------------------
// Link edges
// ---------------------------------------------------------------------------

/// Edge identity. Anchor text and dates are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    pub source: String,
    pub target: String,
}

/// Mutable payload of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStats {
    pub target_url: String,
    pub anchor: String,
    pub first_seen: CaptureTime,
    pub last_seen: CaptureTime,
    pub observation_count: u64,
}

impl LinkStats {
    /// Re-observation: widen the date range and add the incoming count.
    /// Target URL and anchor follow the earliest observation (ties: smaller).
    fn observe(&mut self, other: &LinkStats) {
        let theirs = (other.first_seen, &other.target_url, &other.anchor);
        if theirs < (self.first_seen, &self.target_url, &self.anchor) {
            self.target_url = other.target_url.clone();
            self.anchor = other.anchor.clone();
        }
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
        self.observation_count += other.observation_count;
    }
}

/// An observed hyperlink, as carried between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEdge {
    pub source_key: String,
    pub target_key: String,
    pub target_url: String,
    #[serde(default)]
    pub anchor: String,
    pub first_seen: CaptureTime,
    pub last_seen: CaptureTime,
    pub observation_count: u64,
}

impl LinkEdge {
    /// A single observation of `source_key → target_url` at `at`. Returns
    /// `None` when either end has no canonical identity.
    pub fn observed(source_key: &str, target_url: &str, anchor: &str, at: CaptureTime) -> Option<Self> {
        let target_key = canonicalize(target_url);
        if !has_identity(source_key) || !has_identity(&target_key) {
            return None;
        }
        Some(Self {
            source_key: source_key.to_string(),
            target_key,
            target_url: target_url.to_string(),
            anchor: anchor.trim().to_string(),
            first_seen: at,
            last_seen: at,
            observation_count: 1,
        })
    }

    pub fn key(&self) -> LinkKey {
        LinkKey {
            source: self.source_key.clone(),
            target: self.target_key.clone(),
        }
    }

    fn into_parts(self) -> (LinkKey, LinkStats) {
        (
            LinkKey {
                source: self.source_key,
                target: self.target_key,
            },
            LinkStats {
                target_url: self.target_url,
                anchor: self.anchor,
                first_seen: self.first_seen,
                last_seen: self.last_seen,
                observation_count: self.observation_count,
            },
        )
    }

    fn from_parts(key: &LinkKey, stats: &LinkStats) -> Self {
        Self {
            source_key: key.source.clone(),
            target_key: key.target.clone(),
            target_url: stats.target_url.clone(),
            anchor: stats.anchor.clone(),
            first_seen: stats.first_seen,
            last_seen: stats.last_seen,
            observation_count: stats.observation_count,
        }
    }
}

/// A capped map of edges. Updates to known edges always apply; new distinct
/// edges are dropped once `cap` is reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeMap {
    edges: BTreeMap<LinkKey, LinkStats>,
}

impl EdgeMap {
    /// Record an observation. Returns false when a new edge was dropped by the cap.
    pub fn record(&mut self, edge: LinkEdge, cap: usize) -> bool {
        let (key, stats) = edge.into_parts();
        if let Some(existing) = self.edges.get_mut(&key) {
            existing.observe(&stats);
            return true;
        }
        if self.edges.len() >= cap {
            return false;
        }
        self.edges.insert(key, stats);
        true
    }

    pub fn get(&self, key: &LinkKey) -> Option<&LinkStats> {
        self.edges.get(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkKey, &LinkStats)> {
        self.edges.iter()
    }

    pub fn to_edges(&self) -> Vec<LinkEdge> {
        self.edges
            .iter()
            .map(|(k, s)| LinkEdge::from_parts(k, s))
            .collect()
    }
}

impl Serialize for EdgeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_edges().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EdgeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let edges = Vec::<LinkEdge>::deserialize(deserializer)?;
        Ok(Self {
            edges: edges.into_iter().map(LinkEdge::into_parts).collect(),
        })
    }
}

/// Which inlinks to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlinkKind {
    /// Source shares an authority segment with the document.
    Internal,
    External,
    All,
}

// ---------------------------------------------------------------------------
// Document aggregate
// ---------------------------------------------------------------------------

/// Where the representative capture was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLocation {
    pub name: String,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAggregate {
    pub collections: BTreeSet<String>,
    pub titles: BTreeSet<String>,
    pub urls: BTreeSet<String>,
    pub canonical_keys: BTreeSet<String>,
    pub hosts: BTreeSet<String>,
    pub content: BTreeSet<String>,
    pub url_tokens: BTreeSet<String>,
    pub metadata: BTreeSet<String>,
    /// Earliest capture time among everything folded in.
    pub representative_time: CaptureTime,
    #[serde(default)]
    pub mime_detected: String,
    #[serde(default)]
    pub mime_reported: String,
    /// Capture-event id of the record the host side came from.
    #[serde(default)]
    pub container_digest: String,
    /// Digest of the page body. Captures sharing it are one document.
    pub content_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveLocation>,
    #[serde(default)]
    pub outlinks: EdgeMap,
    #[serde(default)]
    pub inlinks: EdgeMap,
}

impl DocumentAggregate {
    pub fn new(representative_time: CaptureTime, content_digest: &str) -> Self {
        Self {
            collections: BTreeSet::new(),
            titles: BTreeSet::new(),
            urls: BTreeSet::new(),
            canonical_keys: BTreeSet::new(),
            hosts: BTreeSet::new(),
            content: BTreeSet::new(),
            url_tokens: BTreeSet::new(),
            metadata: BTreeSet::new(),
            representative_time,
            mime_detected: String::new(),
            mime_reported: String::new(),
            container_digest: String::new(),
            content_digest: content_digest.to_string(),
            archive: None,
            outlinks: EdgeMap::default(),
            inlinks: EdgeMap::default(),
        }
    }

    /// Document identifier in the index.
    pub fn id(&self) -> &str {
        &self.content_digest
    }

    pub fn add_collection(&mut self, collection: &str) {
        insert_non_empty(&mut self.collections, collection);
    }

    pub fn add_title(&mut self, title: &str) {
        insert_non_empty(&mut self.titles, title);
    }

    pub fn add_content(&mut self, content: &str) {
        insert_non_empty(&mut self.content, content);
    }

    pub fn add_metadata(&mut self, metadata: &str) {
        insert_non_empty(&mut self.metadata, metadata);
    }

    /// Add a URL together with its host, word tokens and canonical key.
    pub fn add_url(&mut self, url: &str) {
        if !insert_non_empty(&mut self.urls, url) {
            return;
        }

        let host = match host_and_protocol(url) {
            Some((host, _)) => host,
            None => url
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .split('/')
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        insert_non_empty(&mut self.hosts, &host);
        insert_non_empty(&mut self.url_tokens, &url_tokens(url));
        insert_non_empty(&mut self.canonical_keys, &canonicalize(url));
    }

    /// The key this document's outlinks originate from.
    pub fn primary_key(&self) -> Option<&str> {
        self.canonical_keys
            .iter()
            .find(|k| has_identity(k))
            .map(String::as_str)
    }

    /// Record an outlink observed in this document's own capture.
    pub fn add_outlink(&mut self, target_url: &str, anchor: &str) -> bool {
        let Some(source) = self.primary_key() else {
            return false;
        };
        match LinkEdge::observed(source, target_url, anchor, self.representative_time) {
            Some(edge) => self.outlinks.record(edge, MAX_OUTLINKS),
            None => false,
        }
    }

    pub fn add_outlink_edge(&mut self, edge: LinkEdge) -> bool {
        self.outlinks.record(edge, MAX_OUTLINKS)
    }

    pub fn add_inlink_edge(&mut self, edge: LinkEdge) -> bool {
        self.inlinks.record(edge, MAX_INLINKS)
    }

    /// True when the inlink's source authority matches one of ours.
    pub fn is_internal(&self, key: &LinkKey) -> bool {
        let domain = authority(&key.source);
        self.canonical_keys.iter().any(|k| authority(k) == domain)
    }

    pub fn inlinks_of(&self, kind: InlinkKind) -> Vec<LinkEdge> {
        self.inlinks
            .iter()
            .filter(|(key, _)| match kind {
                InlinkKind::Internal => self.is_internal(key),
                InlinkKind::External => !self.is_internal(key),
                InlinkKind::All => true,
            })
            .map(|(k, s)| LinkEdge::from_parts(k, s))
            .collect()
    }

    /// Non-blank anchor texts of the selected inlinks.
    pub fn inlink_anchors(&self, kind: InlinkKind) -> Vec<String> {
        self.inlinks_of(kind)
            .into_iter()
            .map(|e| e.anchor)
            .filter(|a| !a.trim().is_empty())
            .collect()
    }

    /// Distinct source keys of the selected inlinks.
    pub fn inlink_sources(&self, kind: InlinkKind) -> Vec<String> {
        let sources: BTreeSet<String> = self
            .inlinks_of(kind)
            .into_iter()
            .map(|e| e.source_key)
            .filter(|s| !s.trim().is_empty())
            .collect();
        sources.into_iter().collect()
    }

    /// Fold `other` into `self`. Scalar fields stay with `self`.
    pub(crate) fn absorb(&mut self, other: DocumentAggregate) {
        self.collections.extend(other.collections);
        self.titles.extend(other.titles);
        self.urls.extend(other.urls);
        self.canonical_keys.extend(other.canonical_keys);
        self.hosts.extend(other.hosts);
        self.content.extend(other.content);
        self.url_tokens.extend(other.url_tokens);
        self.metadata.extend(other.metadata);
        for edge in other.outlinks.to_edges() {
            self.add_outlink_edge(edge);
        }
        for edge in other.inlinks.to_edges() {
            self.add_inlink_edge(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> CaptureTime {
        CaptureTime::parse(raw).unwrap()
    }

    fn doc(url: &str, ts: &str) -> DocumentAggregate {
        let mut d = DocumentAggregate::new(t(ts), &format!("digest-{url}-{ts}"));
        d.add_url(url);
        d
    }

    #[test]
    fn add_url_derives_host_tokens_and_key() {
        let d = doc("http://www.arquivo.pt/sobre", "20200101000000");
        assert!(d.hosts.contains("www.arquivo.pt"));
        assert!(d.canonical_keys.contains("pt,arquivo)/sobre"));
        assert!(d.url_tokens.contains("http www arquivo pt sobre"));
    }

    #[test]
    fn empty_values_never_inserted() {
        let mut d = doc("http://a.com/", "20200101000000");
        d.add_title("");
        d.add_collection("");
        d.add_metadata("");
        assert!(d.titles.is_empty());
        assert!(d.collections.is_empty());
        assert!(d.metadata.is_empty());
    }

    #[test]
    fn reobserving_an_edge_updates_instead_of_duplicating() {
        let mut d = doc("http://a.com/", "20200301000000");
        let early = LinkEdge::observed("com,b)/", "http://a.com/", "A", t("20200101000000")).unwrap();
        let late = LinkEdge::observed("com,b)/", "http://a.com/", "other anchor", t("20200601000000")).unwrap();

        d.add_inlink_edge(early.clone());
        d.add_inlink_edge(late);

        assert_eq!(d.inlinks.len(), 1);
        let stats = d.inlinks.get(&early.key()).unwrap();
        assert_eq!(stats.first_seen, t("20200101000000"));
        assert_eq!(stats.last_seen, t("20200601000000"));
        assert_eq!(stats.observation_count, 2);
        assert_eq!(stats.anchor, "A");
    }

    #[test]
    fn outlinks_capped_at_1000_distinct_edges() {
        let mut d = doc("http://hub.com/", "20200101000000");
        for i in 0..2000 {
            d.add_outlink(&format!("http://site{i}.com/"), "");
        }
        assert_eq!(d.outlinks.len(), MAX_OUTLINKS);
    }

    #[test]
    fn existing_edges_still_update_at_cap() {
        let mut d = doc("http://hub.com/", "20200101000000");
        for i in 0..MAX_INLINKS {
            let e = LinkEdge::observed(&format!("com,site{i})/"), "http://hub.com/", "", t("20200101000000")).unwrap();
            d.add_inlink_edge(e);
        }
        let again = LinkEdge::observed("com,site0)/", "http://hub.com/", "", t("20210101000000")).unwrap();
        let fresh = LinkEdge::observed("com,new)/", "http://hub.com/", "", t("20210101000000")).unwrap();

        assert!(d.add_inlink_edge(again.clone()));
        assert!(!d.add_inlink_edge(fresh));
        assert_eq!(d.inlinks.len(), MAX_INLINKS);
        assert_eq!(d.inlinks.get(&again.key()).unwrap().observation_count, 2);
    }

    #[test]
    fn outlink_needs_both_identities() {
        let mut d = DocumentAggregate::new(t("20200101000000"), "x");
        assert!(!d.add_outlink("http://a.com/", ""), "no source key yet");
        d.add_url("http://b.com/");
        assert!(!d.add_outlink("http://", ""));
        assert!(d.add_outlink("http://a.com/", "A"));
    }

    #[test]
    fn inlinks_split_internal_and_external() {
        let mut d = doc("http://arquivo.pt/wayback", "20200101000000");
        let internal = LinkEdge::observed("pt,arquivo)/textsearch", "http://arquivo.pt/wayback", "search", t("20200101000000")).unwrap();
        let sub = LinkEdge::observed("pt,arquivo,premio)/", "http://arquivo.pt/wayback", "premio", t("20200101000000")).unwrap();
        let external = LinkEdge::observed("com,news)/story", "http://arquivo.pt/wayback", "  ", t("20200101000000")).unwrap();
        d.add_inlink_edge(internal);
        d.add_inlink_edge(sub);
        d.add_inlink_edge(external);

        assert_eq!(d.inlinks_of(InlinkKind::Internal).len(), 1);
        assert_eq!(d.inlinks_of(InlinkKind::External).len(), 2);
        assert_eq!(d.inlinks_of(InlinkKind::All).len(), 3);
        assert_eq!(d.inlink_anchors(InlinkKind::External), vec!["premio".to_string()]);
        assert_eq!(
            d.inlink_sources(InlinkKind::External),
            vec!["com,news)/story".to_string(), "pt,arquivo,premio)/".to_string()]
        );
    }

    #[test]
    fn edge_maps_serialize_as_edge_lists() {
        let mut d = doc("http://a.com/", "20200101000000");
        d.add_outlink("http://b.com/x", "B");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["outlinks"][0]["targetKey"], "com,b)/x");
        assert_eq!(json["outlinks"][0]["observationCount"], 1);
        let back: DocumentAggregate = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }
}
