//! Projection of digest-stage representatives into output JSON.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};

use imagesearch_common::text::{host_and_protocol, url_tokens};
use imagesearch_common::{DocumentAggregate, MergedImageRecord, OutputMode};

use crate::digest::Representative;

/// One output record in the selected shape.
pub fn project(representative: &Representative, mode: OutputMode) -> serde_json::Result<Value> {
    match (mode, representative) {
        (OutputMode::Full, r) => serde_json::to_value(r),
        (OutputMode::Legacy, Representative::Image(r)) => Ok(legacy_image(r)),
        (OutputMode::Legacy, Representative::Document(d)) => Ok(legacy_document(d)),
        (OutputMode::Compact, Representative::Image(r)) => Ok(compact_image(r)),
        (OutputMode::Compact, Representative::Document(d)) => Ok(compact_document(d)),
    }
}

/// `project` rendered as a single JSON line.
pub fn to_json_line(representative: &Representative, mode: OutputMode) -> serde_json::Result<String> {
    serde_json::to_string(&project(representative, mode)?)
}

fn legacy_image(r: &MergedImageRecord) -> Value {
    let page = r.page_context();
    json!({
        "imgWidth": r.image.width.unwrap_or(0),
        "imgHeight": r.image.height.unwrap_or(0),
        "imgSrc": r.image.url,
        "imgTitle": page.map_or("", |p| p.img_title.as_str()),
        "imgAlt": page.map_or("", |p| p.img_alt.as_str()),
        "timestamp": r.image.capture_time.to_archive_string(),
        "originalURL": page.map_or("", |p| p.page_url.as_str()),
        "collection": r.image.collection,
    })
}

fn legacy_document(d: &DocumentAggregate) -> Value {
    json!({
        "id": d.id(),
        "url": first(&d.urls),
        "title": first(&d.titles),
        "timestamp": d.representative_time.to_archive_string(),
        "type": d.mime_detected,
        "collection": first(&d.collections),
    })
}

fn compact_image(r: &MergedImageRecord) -> Value {
    let image = &r.image;
    let page = r.page_context();
    let mut out = Map::new();

    out.insert("id".into(), json!(image.content_digest));
    out.insert("digest".into(), json!(r.digest_key()));
    out.insert("imgSrc".into(), json!(image.url));
    out.insert("date".into(), json!(image.capture_time.formatted()));
    out.insert("tstamp".into(), json!(image.capture_time.to_archive_string()));
    if let Some(p) = page {
        insert_non_empty(&mut out, "imgTitle", &p.img_title);
        insert_non_empty(&mut out, "imgAlt", &p.img_alt);
    }
    out.insert("type".into(), json!(image.mime_detected));
    out.insert("typeReported".into(), json!(image.mime_reported));
    if let (Some(w), Some(h)) = (image.width, image.height) {
        out.insert("imgWidth".into(), json!(w));
        out.insert("imgHeight".into(), json!(h));
    }
    let tokens = page.map_or_else(|| url_tokens(&image.url), |p| p.img_url_tokens.clone());
    out.insert("urlTokens".into(), json!(tokens));
    let host = host_and_protocol(&image.url).map(|(h, _)| h).unwrap_or_default();
    out.insert("host".into(), json!(host));
    if let Some(p) = page {
        out.insert("pageURL".into(), json!(p.page_url));
        insert_non_empty(&mut out, "pageTitle", &p.page_title);
        out.insert("pageHost".into(), json!(p.page_host));
    }
    out.insert("collection".into(), json!(r.collections));
    Value::Object(out)
}

fn compact_document(d: &DocumentAggregate) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), json!(d.id()));
    out.insert("digestContainer".into(), json!(d.container_digest));
    out.insert("url".into(), json!(d.urls));
    out.insert("date".into(), json!(d.representative_time.formatted()));
    out.insert("tstamp".into(), json!(d.representative_time.to_archive_string()));
    insert_set(&mut out, "title", &d.titles);
    out.insert("type".into(), json!(d.mime_detected));
    out.insert("typeReported".into(), json!(d.mime_reported));
    insert_set(&mut out, "content", &d.content);
    out.insert("urlTokens".into(), json!(d.url_tokens));
    out.insert("host".into(), json!(d.hosts));
    insert_set(&mut out, "metadata", &d.metadata);
    out.insert("collection".into(), json!(d.collections));
    Value::Object(out)
}

fn first(set: &BTreeSet<String>) -> &str {
    set.iter().next().map_or("", String::as_str)
}

fn insert_non_empty(out: &mut Map<String, Value>, field: &str, value: &str) {
    if !value.is_empty() {
        out.insert(field.into(), json!(value));
    }
}

fn insert_set(out: &mut Map<String, Value>, field: &str, values: &BTreeSet<String>) {
    if !values.is_empty() {
        out.insert(field.into(), json!(values));
    }
}
