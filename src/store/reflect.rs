//! Name-based method dispatch for backends whose signatures are only known
//! at runtime. This is the only place in the crate that performs dynamic
//! dispatch by method name.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::JsonMap;

/// How a method wants its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "names", rename_all = "lowercase")]
pub enum ParamShape {
    /// A single request record populated by field name.
    Record(Vec<String>),
    /// Plain positional arguments, named for matching only.
    Positional(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub params: ParamShape,
}

impl MethodSignature {
    pub fn record(name: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            params: ParamShape::Record(fields.iter().map(|f| f.to_string()).collect()),
        }
    }

    pub fn positional(name: &str, params: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            params: ParamShape::Positional(params.iter().map(|p| p.to_string()).collect()),
        }
    }
}

/// A backend that exposes its operations by name.
///
/// `invoke` returns results by position: the value first, then an error
/// slot that is `null` on success.
#[async_trait::async_trait]
pub trait DynamicBackend: Send + Sync {
    fn methods(&self) -> Vec<MethodSignature>;
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Vec<Value>>;
}

/// `CreateMenu`, `create_menu` and `createMenu` all fold to `createmenu`.
fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn fold_field(name: &str) -> String {
    fold_name(name)
}

pub fn find_method<'a>(methods: &'a [MethodSignature], candidates: &[&str]) -> Option<&'a MethodSignature> {
    candidates.iter().find_map(|candidate| {
        let folded = fold_name(candidate);
        methods.iter().find(|m| fold_name(&m.name) == folded)
    })
}

fn lookup<'a>(named: &'a JsonMap, param: &str) -> Option<&'a Value> {
    let folded = fold_field(param);
    named
        .iter()
        .find(|(key, _)| fold_field(key) == folded)
        .map(|(_, value)| value)
}

/// Builds the argument list for `signature` from named values.
pub fn assemble_args(signature: &MethodSignature, named: &JsonMap) -> Vec<Value> {
    match &signature.params {
        ParamShape::Record(fields) => {
            let record: JsonMap = fields
                .iter()
                .filter_map(|field| lookup(named, field).map(|v| (field.clone(), v.clone())))
                .collect();
            vec![Value::Object(record)]
        }
        ParamShape::Positional(params) => params
            .iter()
            .map(|param| lookup(named, param).cloned().unwrap_or(Value::Null))
            .collect(),
    }
}

/// Reads `(value, error)` out of a positional result list.
pub fn read_results(method: &str, mut results: Vec<Value>) -> Result<Value> {
    if results.len() > 1 {
        let err = results.pop().unwrap_or(Value::Null);
        match err {
            Value::Null => {}
            Value::String(message) => return Err(anyhow!("{}: {}", method, message)),
            other => return Err(anyhow!("{}: {}", method, other)),
        }
    }
    Ok(results.into_iter().next().unwrap_or(Value::Null))
}

/// Resolves the first matching method, assembles its arguments and invokes it.
pub async fn call(
    backend: &dyn DynamicBackend,
    candidates: &[&str],
    named: JsonMap,
) -> Result<Value> {
    let methods = backend.methods();
    let signature = find_method(&methods, candidates).ok_or_else(|| {
        anyhow!(
            "backend does not expose any of [{}]",
            candidates.join(", ")
        )
    })?;
    let args = assemble_args(signature, &named);
    let results = backend.invoke(&signature.name, args).await?;
    read_results(&signature.name, results)
}

/// True when the backend exposes one of the candidate names.
pub fn supports(backend: &dyn DynamicBackend, candidates: &[&str]) -> bool {
    find_method(&backend.methods(), candidates).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => JsonMap::new(),
        }
    }

    #[test]
    fn test_method_lookup_folds_case_and_separators() {
        let methods = vec![MethodSignature::positional("CreateMenu", &["code"])];
        assert!(find_method(&methods, &["create_menu"]).is_some());
        assert!(find_method(&methods, &["createMenu"]).is_some());
        assert!(find_method(&methods, &["delete_menu"]).is_none());
    }

    #[test]
    fn test_record_arguments_are_filled_by_field_name() {
        let sig = MethodSignature::record("UpsertItem", &["Menu", "Path", "Position"]);
        let args = assemble_args(
            &sig,
            &named(json!({"menu": "admin_main", "path": "admin_main.x", "extra": 1})),
        );
        assert_eq!(args, vec![json!({"Menu": "admin_main", "Path": "admin_main.x"})]);
    }

    #[test]
    fn test_positional_arguments_follow_declared_order() {
        let sig = MethodSignature::positional("Resolve", &["menu", "locale"]);
        let args = assemble_args(&sig, &named(json!({"locale": "en", "menu": "m"})));
        assert_eq!(args, vec![json!("m"), json!("en")]);
    }

    #[test]
    fn test_results_read_value_then_error() {
        assert_eq!(
            read_results("m", vec![json!({"ok": true}), Value::Null]).unwrap(),
            json!({"ok": true})
        );
        assert!(read_results("m", vec![Value::Null, json!("boom")]).is_err());
        assert_eq!(read_results("m", vec![]).unwrap(), Value::Null);
    }
}
