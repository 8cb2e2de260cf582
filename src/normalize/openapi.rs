//! OpenAPI 3.x and Swagger 2.0 documents to [`ContractModel`].

use super::schema::SchemaNormalizer;
use crate::canonical::{
    ANONYMOUS, ContractModel, Endpoint, EndpointKey, HttpMethod, ObjectSchema, Parameter,
    ParameterLocation, RequestBody, ResponseSpec, Schema, parse_path_template,
};
use crate::error::Warning;
use crate::raw::{RawMap, RawNode, escape_pointer_token};
use crate::resolve::ResolvedDocument;
use std::collections::{BTreeMap, BTreeSet};

const METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

const FORM_MEDIA_TYPES: &[&str] = &["application/x-www-form-urlencoded", "multipart/form-data"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Swagger2,
    OpenApi3,
}

pub fn normalize_openapi(doc: &ResolvedDocument, warnings: &mut Vec<Warning>) -> ContractModel {
    let Some(root) = doc.root.as_map() else {
        warnings.push(Warning {
            side: None,
            pointer: "#".to_string(),
            message: format!("document root must be a mapping, found a {}", doc.root.kind_name()),
        });
        return ContractModel::default();
    };

    let dialect = if root.contains_key("swagger") {
        Dialect::Swagger2
    } else {
        if !root.contains_key("openapi") {
            warnings.push(Warning {
                side: None,
                pointer: "#".to_string(),
                message: "no openapi or swagger version field; reading as OpenAPI 3".to_string(),
            });
        }
        Dialect::OpenApi3
    };

    let mut normalizer = OpenApiNormalizer {
        dialect,
        global_security: parse_security(root.get("security")).unwrap_or_default(),
        produces: string_set(root.get("produces")),
        consumes: string_set(root.get("consumes")),
        warnings,
    };

    let mut model = ContractModel::default();
    for (id, node) in &doc.schemas {
        let schema = normalizer.schema(node, &id.0);
        model.schemas.insert(id.canonical(), schema);
    }

    let Some(paths) = root.get("paths") else {
        return model;
    };
    let Some(paths) = paths.as_map() else {
        normalizer.warn("#/paths", format!("paths must be a mapping, found a {}", paths.kind_name()));
        return model;
    };
    for (path, item) in paths.iter() {
        let item_pointer = format!("#/paths/{}", escape_pointer_token(path));
        let Some(item) = item.as_map() else {
            normalizer.warn(&item_pointer, "path item must be a mapping".to_string());
            continue;
        };
        let shared = item.get_seq("parameters").unwrap_or_default();
        for (method, operation) in item.iter() {
            if !METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                continue;
            }
            let pointer = format!("{item_pointer}/{method}");
            let Some(operation) = operation.as_map() else {
                normalizer.warn(&pointer, "operation must be a mapping".to_string());
                continue;
            };
            let endpoint = normalizer.operation(method, path, operation, shared, &item_pointer, &pointer);
            if model.endpoints.contains_key(&endpoint.key) {
                normalizer.warn(
                    &pointer,
                    format!(
                        "duplicate endpoint {} (paths differ only in variable names); keeping the first",
                        endpoint.key
                    ),
                );
                continue;
            }
            model.endpoints.insert(endpoint.key.clone(), endpoint);
        }
    }
    model
}

struct OpenApiNormalizer<'w> {
    dialect: Dialect,
    global_security: BTreeSet<String>,
    produces: BTreeSet<String>,
    consumes: BTreeSet<String>,
    warnings: &'w mut Vec<Warning>,
}

/// Swagger 2.0 form parameters collected while walking an operation.
#[derive(Default)]
struct FormFields {
    fields: BTreeMap<String, Schema>,
    required: BTreeSet<String>,
}

impl OpenApiNormalizer<'_> {
    fn schema(&mut self, node: &RawNode, pointer: &str) -> Schema {
        SchemaNormalizer::new(&mut *self.warnings).normalize(node, pointer)
    }

    fn warn(&mut self, pointer: &str, message: String) {
        self.warnings.push(Warning {
            side: None,
            pointer: pointer.to_string(),
            message,
        });
    }

    fn operation(
        &mut self,
        method: &str,
        path: &str,
        operation: &RawMap,
        shared: &[RawNode],
        item_pointer: &str,
        pointer: &str,
    ) -> Endpoint {
        let (parts, names) = parse_path_template(path);
        let key = EndpointKey {
            method: HttpMethod::parse(method),
            path: parts,
        };
        let mut endpoint = Endpoint::new(key, names);
        let mut form = FormFields::default();

        let own = operation.get_seq("parameters").unwrap_or_default();
        let declared = shared
            .iter()
            .enumerate()
            .map(|(i, p)| (p, format!("{item_pointer}/parameters/{i}")))
            .chain(
                own.iter()
                    .enumerate()
                    .map(|(i, p)| (p, format!("{pointer}/parameters/{i}"))),
            );
        for (node, param_pointer) in declared {
            self.parameter(node, &param_pointer, operation, &mut endpoint, &mut form);
        }

        if let Some(body) = operation.get_map("requestBody") {
            endpoint.request_body = Some(self.request_body(body, &format!("{pointer}/requestBody")));
        } else if !form.fields.is_empty() {
            let mut media_types: BTreeSet<String> = self
                .consumes_for(operation)
                .into_iter()
                .filter(|m| FORM_MEDIA_TYPES.contains(&m.as_str()))
                .collect();
            if media_types.is_empty() {
                media_types.insert(FORM_MEDIA_TYPES[0].to_string());
            }
            endpoint.request_body = Some(RequestBody {
                required: !form.required.is_empty(),
                media_types,
                schema: Some(Schema::Object(ObjectSchema {
                    fields: form.fields,
                    required: form.required,
                    ..Default::default()
                })),
            });
        }

        if let Some(responses) = operation.get_map("responses") {
            for (status, response) in responses.iter() {
                let status_pointer = format!("{pointer}/responses/{}", escape_pointer_token(status));
                let status = canonical_status(status);
                let response = self.response(&status, response, operation, &status_pointer);
                endpoint.responses.insert(status, response);
            }
        }

        endpoint.security =
            parse_security(operation.get("security")).unwrap_or_else(|| self.global_security.clone());
        endpoint.deprecated = operation.get_bool("deprecated").unwrap_or(false);
        endpoint
    }

    fn parameter(
        &mut self,
        node: &RawNode,
        pointer: &str,
        operation: &RawMap,
        endpoint: &mut Endpoint,
        form: &mut FormFields,
    ) {
        let Some(map) = node.as_map() else {
            self.warn(pointer, format!("parameter must be a mapping, found a {}", node.kind_name()));
            return;
        };
        let Some(name) = map.get_str("name") else {
            self.warn(pointer, "parameter has no name".to_string());
            return;
        };
        let required = map.get_bool("required").unwrap_or(false);
        let location = map.get_str("in").unwrap_or("query");

        match location {
            "body" => {
                let schema = match map.get("schema") {
                    Some(schema) => self.schema(schema, &format!("{pointer}/schema")),
                    None => Schema::any(),
                };
                endpoint.request_body = Some(RequestBody {
                    required,
                    media_types: self.consumes_for(operation),
                    schema: Some(schema),
                });
                return;
            }
            "formData" => {
                let schema = self.parameter_schema(map, pointer);
                form.fields.insert(name.to_string(), schema);
                if required {
                    form.required.insert(name.to_string());
                }
                return;
            }
            _ => {}
        }

        let Some(location) = ParameterLocation::from_id(location) else {
            self.warn(pointer, format!("unknown parameter location \"{location}\""));
            return;
        };
        let canonical_name = match location {
            ParameterLocation::Header => name.to_ascii_lowercase(),
            ParameterLocation::Path => {
                match endpoint.variable_names.iter().position(|v| v == name) {
                    Some(index) => format!("{{{index}}}"),
                    None => {
                        self.warn(
                            pointer,
                            format!("path parameter \"{name}\" does not appear in the path template"),
                        );
                        name.to_string()
                    }
                }
            }
            _ => name.to_string(),
        };
        let parameter = Parameter {
            name: canonical_name,
            location,
            required: location == ParameterLocation::Path || required,
            schema: self.parameter_schema(map, pointer),
        };
        // Operation-level declarations come later and override path-level ones.
        endpoint.parameters.insert(parameter.key(), parameter);
    }

    fn parameter_schema(&mut self, map: &RawMap, pointer: &str) -> Schema {
        if let Some(schema) = map.get("schema") {
            return self.schema(schema, &format!("{pointer}/schema"));
        }
        if let Some(content) = map.get_map("content") {
            return match preferred_media(content) {
                Some((media, Some(schema))) => self.schema(
                    schema,
                    &format!("{pointer}/content/{}/schema", escape_pointer_token(media)),
                ),
                _ => Schema::any(),
            };
        }
        match self.dialect {
            // Swagger 2.0 non-body parameters describe their type inline.
            Dialect::Swagger2 => SchemaNormalizer::new(&mut *self.warnings).normalize_map(map, pointer),
            Dialect::OpenApi3 => Schema::any(),
        }
    }

    fn request_body(&mut self, body: &RawMap, pointer: &str) -> RequestBody {
        let (media_types, schema) = match body.get_map("content") {
            Some(content) => self.content(content, pointer),
            None => (BTreeSet::new(), None),
        };
        RequestBody {
            required: body.get_bool("required").unwrap_or(false),
            media_types,
            schema,
        }
    }

    fn response(
        &mut self,
        status: &str,
        response: &RawNode,
        operation: &RawMap,
        pointer: &str,
    ) -> ResponseSpec {
        let mut spec = ResponseSpec {
            status: status.to_string(),
            media_types: BTreeSet::new(),
            schema: None,
        };
        let Some(response) = response.as_map() else {
            self.warn(pointer, "response must be a mapping".to_string());
            return spec;
        };
        match self.dialect {
            Dialect::OpenApi3 => {
                if let Some(content) = response.get_map("content") {
                    let (media_types, schema) = self.content(content, pointer);
                    spec.media_types = media_types;
                    spec.schema = schema;
                }
            }
            Dialect::Swagger2 => {
                if let Some(schema) = response.get("schema") {
                    spec.schema = Some(self.schema(schema, &format!("{pointer}/schema")));
                    spec.media_types = self.produces_for(operation);
                }
            }
        }
        spec
    }

    /// Media types of a `content` map plus the schema of the preferred one.
    fn content(&mut self, content: &RawMap, pointer: &str) -> (BTreeSet<String>, Option<Schema>) {
        let media_types = content.keys().map(canonical_media_type).collect();
        let schema = match preferred_media(content) {
            Some((media, Some(schema))) => Some(self.schema(
                schema,
                &format!("{pointer}/content/{}/schema", escape_pointer_token(media)),
            )),
            _ => None,
        };
        (media_types, schema)
    }

    fn consumes_for(&self, operation: &RawMap) -> BTreeSet<String> {
        match operation.get("consumes") {
            Some(node) => string_set(Some(node)),
            None => self.consumes.clone(),
        }
    }

    fn produces_for(&self, operation: &RawMap) -> BTreeSet<String> {
        match operation.get("produces") {
            Some(node) => string_set(Some(node)),
            None => self.produces.clone(),
        }
    }
}

/// Picks the media type whose schema represents a payload: `application/json`
/// first, then any other JSON type, then the first in sorted order.
fn preferred_media(content: &RawMap) -> Option<(&str, Option<&RawNode>)> {
    let mut keys: Vec<&str> = content.keys().collect();
    keys.sort_by_key(|k| canonical_media_type(k));
    let chosen = keys
        .iter()
        .find(|k| canonical_media_type(k) == "application/json")
        .or_else(|| keys.iter().find(|k| canonical_media_type(k).contains("json")))
        .or_else(|| keys.first())?;
    let schema = content
        .get_map(chosen)
        .and_then(|media| media.get("schema"));
    Some((*chosen, schema))
}

/// Lowercased media type without parameters.
pub fn canonical_media_type(media: &str) -> String {
    media
        .split(';')
        .next()
        .unwrap_or(media)
        .trim()
        .to_ascii_lowercase()
}

/// `2xx` and `2XX` are the same class; `default` stays as written.
fn canonical_status(status: &str) -> String {
    let status = status.trim();
    if status.eq_ignore_ascii_case("default") {
        "default".to_string()
    } else {
        status.to_ascii_uppercase()
    }
}

fn string_set(node: Option<&RawNode>) -> BTreeSet<String> {
    node.and_then(RawNode::as_seq)
        .map(|items| {
            items
                .iter()
                .filter_map(RawNode::as_str)
                .map(canonical_media_type)
                .collect()
        })
        .unwrap_or_default()
}

/// Security requirement alternatives as canonical strings. `None` when the
/// node is absent, so an explicit empty list can override the global default.
fn parse_security(node: Option<&RawNode>) -> Option<BTreeSet<String>> {
    let requirements = node?.as_seq()?;
    let mut alternatives = BTreeSet::new();
    for requirement in requirements {
        let Some(requirement) = requirement.as_map() else {
            continue;
        };
        if requirement.is_empty() {
            alternatives.insert(ANONYMOUS.to_string());
            continue;
        }
        let mut schemes: Vec<String> = requirement
            .iter()
            .map(|(scheme, scopes)| {
                let mut scopes: Vec<&str> = scopes
                    .as_seq()
                    .map(|s| s.iter().filter_map(RawNode::as_str).collect())
                    .unwrap_or_default();
                scopes.sort_unstable();
                scopes.dedup();
                if scopes.is_empty() {
                    scheme.to_string()
                } else {
                    format!("{scheme}({})", scopes.join(","))
                }
            })
            .collect();
        schemes.sort();
        alternatives.insert(schemes.join("+"));
    }
    Some(alternatives)
}
