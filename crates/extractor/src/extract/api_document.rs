use super::Extract;
use crate::error::{ExtractError, Result};
use crate::language::Language;
use crate::reader::RawFragment;
use crate::template;
use restsum_protocol::{EndpointCandidate, HttpMethod, ParamLocation, Parameter, SourceLocation};
use serde_json::{Map, Value};

const OPERATION_KEYS: [(&str, HttpMethod); 8] = [
    ("get", HttpMethod::Get),
    ("put", HttpMethod::Put),
    ("post", HttpMethod::Post),
    ("delete", HttpMethod::Delete),
    ("options", HttpMethod::Options),
    ("head", HttpMethod::Head),
    ("patch", HttpMethod::Patch),
    ("trace", HttpMethod::Trace),
];

/// Local `$ref` chains longer than this are treated as unresolvable.
const MAX_REF_HOPS: usize = 8;

/// Extractor for OpenAPI 3 and Swagger 2 documents (JSON or YAML)
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiDocumentExtractor;

impl Extract for ApiDocumentExtractor {
    fn extract(&self, fragment: &RawFragment) -> Result<Vec<EndpointCandidate>> {
        let file = fragment.location.file.as_str();
        let doc = parse_document(fragment)?;

        let Some(root) = doc.as_object() else {
            log::debug!("{file}: document root is not a mapping; not an API document");
            return Ok(Vec::new());
        };
        let flavour = if root.contains_key("openapi") {
            "openapi"
        } else if root.contains_key("swagger") {
            "swagger"
        } else {
            log::debug!("{file}: no `openapi` or `swagger` key; not an API document");
            return Ok(Vec::new());
        };

        let paths = match root.get("paths") {
            Some(Value::Object(paths)) => paths,
            Some(Value::Null) | None => {
                log::warn!("{file}: {flavour} document has no paths");
                return Ok(Vec::new());
            }
            Some(_) => {
                return Err(ExtractError::malformed(file, "`paths` is not a mapping"));
            }
        };

        let base_path = root
            .get("basePath")
            .and_then(Value::as_str)
            .filter(|_| flavour == "swagger")
            .unwrap_or("");

        let mut candidates = Vec::new();
        for (raw_path, item) in paths {
            let Some(item) = resolve(&doc, item).as_object() else {
                log::warn!("{file}: path item `{raw_path}` is not a mapping");
                continue;
            };
            let shared = parameters_of(&doc, item.get("parameters"));

            for (key, method) in OPERATION_KEYS {
                let Some(operation) = item.get(key).map(|op| resolve(&doc, op)) else {
                    continue;
                };
                let Some(operation) = operation.as_object() else {
                    log::warn!("{file}: `{key} {raw_path}` is not a mapping");
                    continue;
                };
                candidates.push(candidate(
                    &doc, file, flavour, base_path, raw_path, method, operation, &shared,
                ));
            }
        }

        log::debug!("{file}: {} documented operations", candidates.len());
        Ok(candidates)
    }
}

#[allow(clippy::too_many_arguments)]
fn candidate(
    doc: &Value,
    file: &str,
    flavour: &str,
    base_path: &str,
    raw_path: &str,
    method: HttpMethod,
    operation: &Map<String, Value>,
    shared: &[Parameter],
) -> EndpointCandidate {
    // Operation-level parameters override path-level ones with the same name and location.
    let mut parameters: Vec<Parameter> = parameters_of(doc, operation.get("parameters"));
    for param in shared.iter().rev() {
        if !parameters
            .iter()
            .any(|p| p.name == param.name && p.location == param.location)
        {
            parameters.insert(0, param.clone());
        }
    }

    if let Some(body) = operation.get("requestBody").map(|b| resolve(doc, b)) {
        if !parameters.iter().any(|p| p.location == ParamLocation::Body) {
            parameters.push(
                Parameter::new("body", ParamLocation::Body).with_type_hint(request_body_hint(doc, body)),
            );
        }
    }

    let rewritten = template::rewrite(&template::join(base_path, raw_path));
    for placeholder in rewritten.parameters {
        if !parameters
            .iter()
            .any(|p| p.location == ParamLocation::Path && p.name == placeholder.name)
        {
            parameters.push(placeholder);
        }
    }

    let handler = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let context = [operation.get("summary"), operation.get("description")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    EndpointCandidate::new(method, rewritten.template, SourceLocation::new(file, None))
        .with_handler(handler)
        .with_parameters(parameters)
        .with_framework(flavour)
        .with_context(Some(context))
}

fn parse_document(fragment: &RawFragment) -> Result<Value> {
    let file = fragment.location.file.as_str();
    let text = fragment.text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(ExtractError::malformed(file, "empty document"));
    }

    let looks_like_json = fragment.language == Language::Json || text.trim_start().starts_with('{');
    if looks_like_json {
        return serde_json::from_str(text)
            .map_err(|err| ExtractError::malformed(file, format!("invalid JSON: {err}")));
    }

    let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(text)
        .map_err(|err| ExtractError::malformed(file, format!("invalid YAML: {err}")))?;
    Ok(yaml_to_json(yaml))
}

/// YAML allows non-string keys (`200:` under `responses`); JSON does not.
fn yaml_to_json(value: serde_yaml_ng::Value) -> Value {
    use serde_yaml_ng::Value as Yaml;
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, value) in mapping {
                object.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml_ng::Value) -> String {
    use serde_yaml_ng::Value as Yaml;
    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        other => serde_yaml_ng::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Follow local `#/...` references; anything else is returned as-is.
fn resolve<'a>(doc: &'a Value, value: &'a Value) -> &'a Value {
    let mut current = value;
    for _ in 0..MAX_REF_HOPS {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            return current;
        };
        let Some(pointer) = reference.strip_prefix('#') else {
            return current;
        };
        match doc.pointer(pointer) {
            Some(target) => current = target,
            None => {
                log::debug!("Unresolved reference {reference}");
                return current;
            }
        }
    }
    current
}

fn parameters_of(doc: &Value, list: Option<&Value>) -> Vec<Parameter> {
    let Some(items) = list.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut parameters: Vec<Parameter> = Vec::new();
    for item in items {
        let item = resolve(doc, item);
        let Some(name) = item.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(location) = item
            .get("in")
            .and_then(Value::as_str)
            .and_then(ParamLocation::from_token)
        else {
            log::debug!("Parameter `{name}` has no usable location");
            continue;
        };
        let hint = item
            .get("schema")
            .map(|schema| schema_hint(doc, schema))
            .unwrap_or_else(|| item.get("type").and_then(Value::as_str).map(str::to_string));

        if parameters
            .iter()
            .any(|p| p.name == name && p.location == location)
        {
            continue;
        }
        parameters.push(Parameter::new(name, location).with_type_hint(hint));
    }
    parameters
}

/// `type` of a schema, or the component name of a `$ref`.
fn schema_hint(doc: &Value, schema: &Value) -> Option<String> {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        return reference.rsplit('/').next().map(str::to_string);
    }
    let schema = resolve(doc, schema);
    match schema.get("type") {
        Some(Value::String(kind)) => Some(kind.clone()),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .map(str::to_string),
        _ => None,
    }
}

fn request_body_hint(doc: &Value, body: &Value) -> Option<String> {
    let content = body.get("content")?.as_object()?;
    let preferred = content
        .get("application/json")
        .or_else(|| content.values().next())?;
    preferred.get("schema").and_then(|schema| schema_hint(doc, schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(file: &str, text: &str) -> Result<Vec<EndpointCandidate>> {
        ApiDocumentExtractor.extract(&RawFragment::new(text, file, Language::from_path(file)))
    }

    const PETSTORE_YAML: &str = r##"
openapi: 3.0.3
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets/{petId}:
    parameters:
      - $ref: '#/components/parameters/PetId'
    get:
      operationId: showPetById
      summary: Info for a specific pet
      parameters:
        - name: verbose
          in: query
          schema:
            type: boolean
      responses:
        200:
          description: ok
    put:
      operationId: updatePet
      requestBody:
        content:
          application/json:
            schema:
              $ref: '#/components/schemas/Pet'
      responses:
        204:
          description: updated
components:
  parameters:
    PetId:
      name: petId
      in: path
      required: true
      schema:
        type: string
  schemas:
    Pet:
      type: object
"##;

    #[test]
    fn openapi_yaml_operations_become_candidates() {
        let found = extract("openapi.yaml", PETSTORE_YAML).unwrap();
        assert_eq!(found.len(), 2);

        let get = &found[0];
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.path_template, "/pets/{petId}");
        assert_eq!(get.handler_name.as_deref(), Some("showPetById"));
        assert_eq!(get.context.as_deref(), Some("Info for a specific pet"));
        assert_eq!(get.framework.as_deref(), Some("openapi"));
        assert_eq!(
            get.parameters,
            vec![
                Parameter::new("petId", ParamLocation::Path)
                    .with_type_hint(Some("string".to_string())),
                Parameter::new("verbose", ParamLocation::Query)
                    .with_type_hint(Some("boolean".to_string())),
            ]
        );

        let put = &found[1];
        assert_eq!(put.method, HttpMethod::Put);
        assert_eq!(
            put.parameters.last(),
            Some(&Parameter::new("body", ParamLocation::Body).with_type_hint(Some("Pet".to_string())))
        );
    }

    #[test]
    fn swagger_json_prefixes_base_path() {
        let doc = r##"{
            "swagger": "2.0",
            "basePath": "/v1",
            "paths": {
                "/users": {
                    "post": {
                        "operationId": "createUser",
                        "description": "Creates a user",
                        "parameters": [
                            {"name": "payload", "in": "body", "schema": {"$ref": "#/definitions/User"}}
                        ]
                    }
                }
            }
        }"##;
        let found = extract("swagger.json", doc).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path_template, "/v1/users");
        assert_eq!(found[0].framework.as_deref(), Some("swagger"));
        assert_eq!(
            found[0].parameters,
            vec![Parameter::new("payload", ParamLocation::Body)
                .with_type_hint(Some("User".to_string()))]
        );
    }

    #[test]
    fn invalid_documents_are_malformed() {
        let err = extract("broken.json", "{ \"openapi\": ").err().unwrap();
        assert!(matches!(err, ExtractError::MalformedInput { .. }));

        let err = extract("broken.yaml", "openapi: [unclosed").err().unwrap();
        assert!(matches!(err, ExtractError::MalformedInput { .. }));
    }

    #[test]
    fn unrelated_structured_files_yield_nothing() {
        let found = extract("ci.yml", "jobs:\n  build:\n    runs-on: ubuntu\n").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn undocumented_placeholders_become_path_parameters() {
        let doc = r#"{"openapi": "3.1.0", "paths": {"/orders/{id}": {"delete": {}}}}"#;
        let found = extract("api.json", doc).unwrap();
        assert_eq!(
            found[0].parameters,
            vec![Parameter::new("id", ParamLocation::Path)]
        );
        assert_eq!(found[0].context, None);
    }
}
