//! Request collections (v2.x collection JSON) to [`ContractModel`].
//!
//! A collection describes requests by example rather than by schema, so the
//! resulting model is coarser than one built from an OpenAPI document: query
//! and header parameters are optional strings, request payload fields are
//! optional, and fields seen in example responses are required.

use super::openapi::canonical_media_type;
use super::schema::infer_from_example;
use crate::canonical::{
    ContractModel, Endpoint, EndpointKey, HttpMethod, ObjectSchema, Parameter,
    ParameterLocation, PrimitiveKind, PrimitiveSchema, RequestBody, ResponseSpec, Schema,
    parse_path_template,
};
use crate::error::Warning;
use crate::raw::{RawMap, RawNode};
use std::collections::{BTreeMap, BTreeSet};

/// Headers that describe the payload rather than the operation.
const PAYLOAD_HEADERS: &[&str] = &["content-type", "content-length", "accept"];

pub fn normalize_collection(root: &RawNode, warnings: &mut Vec<Warning>) -> ContractModel {
    let mut normalizer = CollectionNormalizer {
        model: ContractModel::default(),
        warnings,
    };
    let Some(root) = root.as_map() else {
        normalizer.warn("#", format!("collection must be a mapping, found a {}", root.kind_name()));
        return normalizer.model;
    };
    let auth = root.get("auth").map(parse_auth).unwrap_or_default();
    match root.get_seq("item") {
        Some(items) => normalizer.walk(items, "#/item", &auth),
        None => normalizer.warn("#", "collection has no item list".to_string()),
    }
    normalizer.model
}

fn parse_auth(node: &RawNode) -> BTreeSet<String> {
    match node.as_map().and_then(|auth| auth.get_str("type")) {
        None | Some("noauth") => BTreeSet::new(),
        Some(kind) => BTreeSet::from([kind.to_string()]),
    }
}

struct CollectionNormalizer<'w> {
    model: ContractModel,
    warnings: &'w mut Vec<Warning>,
}

impl CollectionNormalizer<'_> {
    fn warn(&mut self, pointer: &str, message: String) {
        self.warnings.push(Warning {
            side: None,
            pointer: pointer.to_string(),
            message,
        });
    }

    /// Visits items depth-first; folders pass their auth down to children.
    fn walk(&mut self, items: &[RawNode], pointer: &str, inherited_auth: &BTreeSet<String>) {
        for (index, item) in items.iter().enumerate() {
            let item_pointer = format!("{pointer}/{index}");
            let Some(item) = item.as_map() else {
                self.warn(&item_pointer, "collection item must be a mapping".to_string());
                continue;
            };
            let auth = match item.get("auth") {
                Some(node) => parse_auth(node),
                None => inherited_auth.clone(),
            };
            if let Some(children) = item.get_seq("item") {
                self.walk(children, &format!("{item_pointer}/item"), &auth);
            } else if let Some(request) = item.get("request") {
                self.request(item, request, &item_pointer, auth);
            }
        }
    }

    fn request(
        &mut self,
        item: &RawMap,
        request: &RawNode,
        pointer: &str,
        inherited_auth: BTreeSet<String>,
    ) {
        let (method, url, request_map) = match request {
            RawNode::String(url) => ("GET", Some(RawNode::String(url.clone())), None),
            RawNode::Mapping(map) => (
                map.get_str("method").unwrap_or("GET"),
                map.get("url").cloned(),
                Some(map),
            ),
            other => {
                self.warn(pointer, format!("request must be a mapping or a URL, found a {}", other.kind_name()));
                return;
            }
        };
        let Some(url) = url else {
            self.warn(pointer, "request has no url".to_string());
            return;
        };

        let (segments, query) = url_parts(&url);
        let (parts, names) = parse_path_template(&template_path(&segments));
        let key = EndpointKey {
            method: HttpMethod::parse(method),
            path: parts,
        };
        if self.model.endpoints.contains_key(&key) {
            self.warn(pointer, format!("duplicate endpoint {key}; keeping the first"));
            return;
        }
        let mut endpoint = Endpoint::new(key, names);

        for (index, _) in endpoint.variable_names.iter().enumerate() {
            let parameter = Parameter {
                name: format!("{{{index}}}"),
                location: ParameterLocation::Path,
                required: true,
                schema: Schema::primitive(PrimitiveKind::String),
            };
            endpoint.parameters.insert(parameter.key(), parameter);
        }
        for name in query {
            let parameter = Parameter {
                name,
                location: ParameterLocation::Query,
                required: false,
                schema: Schema::primitive(PrimitiveKind::String),
            };
            endpoint.parameters.insert(parameter.key(), parameter);
        }

        let mut content_type = None;
        endpoint.security = inherited_auth;
        if let Some(request) = request_map {
            for (name, value) in enabled_entries(request.get("header"), "key") {
                let name = name.to_ascii_lowercase();
                if name == "content-type" {
                    content_type = value.map(|v| canonical_media_type(&v));
                }
                if PAYLOAD_HEADERS.contains(&name.as_str()) {
                    continue;
                }
                let parameter = Parameter {
                    name,
                    location: ParameterLocation::Header,
                    required: false,
                    schema: Schema::primitive(PrimitiveKind::String),
                };
                endpoint.parameters.insert(parameter.key(), parameter);
            }
            if let Some(body) = request.get_map("body") {
                endpoint.request_body = request_body(body, content_type);
            }
            if let Some(auth) = request.get("auth") {
                endpoint.security = parse_auth(auth);
            }
        }

        if let Some(responses) = item.get_seq("response") {
            for (index, response) in responses.iter().enumerate() {
                let Some(response) = response.as_map() else {
                    continue;
                };
                let Some(status) = response_status(response) else {
                    self.warn(
                        &format!("{pointer}/response/{index}"),
                        "example response has no status code".to_string(),
                    );
                    continue;
                };
                endpoint
                    .responses
                    .entry(status.clone())
                    .or_insert_with(|| example_response(status, response));
            }
        }

        tracing::trace!(endpoint = %endpoint.key, "collection request");
        self.model.endpoints.insert(endpoint.key.clone(), endpoint);
    }
}

/// Path segments and enabled query keys of a request URL.
fn url_parts(url: &RawNode) -> (Vec<String>, Vec<String>) {
    match url {
        RawNode::String(raw) => parse_raw_url(raw),
        RawNode::Mapping(map) => {
            let (raw_segments, raw_query) = map
                .get_str("raw")
                .map(parse_raw_url)
                .unwrap_or_default();
            let segments = match map.get("path") {
                Some(RawNode::Sequence(items)) => items
                    .iter()
                    .filter_map(|segment| match segment {
                        RawNode::String(s) => Some(s.clone()),
                        RawNode::Mapping(m) => m.get_str("value").map(str::to_string),
                        _ => None,
                    })
                    .collect(),
                Some(RawNode::String(path)) => path.split('/').map(str::to_string).collect(),
                _ => raw_segments,
            };
            let query = match map.get("query") {
                Some(node) => enabled_entries(Some(node), "key")
                    .into_iter()
                    .map(|(key, _)| key)
                    .collect(),
                None => raw_query,
            };
            (segments, query)
        }
        _ => (Vec::new(), Vec::new()),
    }
}

fn parse_raw_url(raw: &str) -> (Vec<String>, Vec<String>) {
    let raw = raw.split('#').next().unwrap_or(raw);
    let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
    let (path, had_host) = match path.split_once("://") {
        Some((_, rest)) => (rest, true),
        None => (path, !path.starts_with('/')),
    };
    let mut segments: Vec<String> = path.split('/').map(str::to_string).collect();
    if had_host && !segments.is_empty() {
        segments.remove(0);
    }
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split('=').next().unwrap_or(pair).to_string())
        .collect();
    (segments, query)
}

/// Rewrites `:name` and whole-segment `{{name}}` placeholders as `{name}`.
fn template_path(segments: &[String]) -> String {
    let mut path = String::new();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        path.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            path.push_str(&format!("{{{name}}}"));
        } else if let Some(name) = segment
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
        {
            path.push_str(&format!("{{{name}}}"));
        } else {
            path.push_str(segment);
        }
    }
    path
}

/// `(key, value)` pairs of a list of key/value entries, skipping disabled ones.
fn enabled_entries(node: Option<&RawNode>, key_field: &str) -> Vec<(String, Option<String>)> {
    let Some(entries) = node.and_then(RawNode::as_seq) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(RawNode::as_map)
        .filter(|entry| entry.get_bool("disabled") != Some(true))
        .filter_map(|entry| {
            let key = entry.get_str(key_field)?;
            Some((key.to_string(), entry.get_str("value").map(str::to_string)))
        })
        .collect()
}

fn string_schema(format: Option<&str>) -> Schema {
    Schema::Primitive(PrimitiveSchema {
        kind: PrimitiveKind::String,
        format: format.map(str::to_string),
        ..Default::default()
    })
}

fn request_body(body: &RawMap, content_type: Option<String>) -> Option<RequestBody> {
    let mode = body.get_str("mode")?;
    let (default_media, schema) = match mode {
        "raw" => {
            let raw = body.get_str("raw").unwrap_or_default();
            if raw.trim().is_empty() {
                return None;
            }
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(value) => ("application/json", infer_from_example(&value, false)),
                Err(_) => ("text/plain", string_schema(None)),
            }
        }
        "urlencoded" | "formdata" => {
            let mut fields = BTreeMap::new();
            for entry in body
                .get_seq(mode)
                .unwrap_or_default()
                .iter()
                .filter_map(RawNode::as_map)
                .filter(|entry| entry.get_bool("disabled") != Some(true))
            {
                let Some(key) = entry.get_str("key") else {
                    continue;
                };
                let schema = if entry.get_str("type") == Some("file") {
                    string_schema(Some("binary"))
                } else {
                    string_schema(None)
                };
                fields.insert(key.to_string(), schema);
            }
            let media = if mode == "urlencoded" {
                "application/x-www-form-urlencoded"
            } else {
                "multipart/form-data"
            };
            (
                media,
                Schema::Object(ObjectSchema {
                    fields,
                    ..Default::default()
                }),
            )
        }
        "graphql" => (
            "application/json",
            Schema::Object(ObjectSchema {
                fields: BTreeMap::from([
                    ("query".to_string(), string_schema(None)),
                    ("variables".to_string(), Schema::any()),
                ]),
                required: BTreeSet::from(["query".to_string()]),
                ..Default::default()
            }),
        ),
        "file" => ("application/octet-stream", string_schema(Some("binary"))),
        _ => return None,
    };
    Some(RequestBody {
        required: true,
        media_types: BTreeSet::from([content_type.unwrap_or_else(|| default_media.to_string())]),
        schema: Some(schema),
    })
}

fn response_status(response: &RawMap) -> Option<String> {
    match response.get("code")? {
        RawNode::Number(code) => code.as_u64().map(|c| c.to_string()),
        RawNode::String(code) => Some(code.trim().to_ascii_uppercase()),
        _ => None,
    }
}

fn example_response(status: String, response: &RawMap) -> ResponseSpec {
    let content_type = enabled_entries(response.get("header"), "key")
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .and_then(|(_, value)| value)
        .map(|v| canonical_media_type(&v));
    let body = response.get_str("body").unwrap_or_default();
    let (media, schema) = if body.trim().is_empty() {
        (content_type, None)
    } else {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => (
                content_type.or_else(|| Some("application/json".to_string())),
                Some(infer_from_example(&value, true)),
            ),
            Err(_) => (
                content_type.or_else(|| Some("text/plain".to_string())),
                Some(string_schema(None)),
            ),
        }
    };
    ResponseSpec {
        status,
        media_types: media.into_iter().collect(),
        schema,
    }
}
