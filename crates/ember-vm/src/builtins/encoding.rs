//! Encoding built-ins (`std:json`)

use super::registry::BuiltinModule;
use super::utils::{arg, string_arg};
use crate::error::VmError;
use crate::object::ObjData;
use crate::value::Value;
use crate::vm::VM;

/// Nesting limit for stringify; deeper (or cyclic) values are rejected
const MAX_JSON_DEPTH: usize = 128;

pub fn module() -> BuiltinModule {
    let mut module = BuiltinModule::new();
    module
        .register("parse", vm_json_parse, 1)
        .register("stringify", vm_json_stringify, -1);
    module
}

/// parse(string) -> Value
pub fn vm_json_parse(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let text = string_arg(vm, "parse", args, 0)?;
    let parsed: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| VmError::Runtime(format!("JSON parse error: {}", e)))?;
    json_to_value(vm, parsed)
}

/// stringify(value, pretty?) -> String
pub fn vm_json_stringify(vm: &mut VM, args: &[Value]) -> Result<Value, VmError> {
    let value = arg("stringify", args, 0)?;
    let pretty = args.get(1).is_some_and(|flag| !flag.is_falsey());

    let json = value_to_json(vm, value, 0)?;
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| VmError::Runtime(format!("JSON stringify error: {}", e)))?;

    Ok(vm.intern(&text))
}

// --- JSON Helpers ---

fn json_to_value(vm: &mut VM, json: serde_json::Value) -> Result<Value, VmError> {
    Ok(match json {
        serde_json::Value::Null => Value::NIL,
        serde_json::Value::Bool(b) => Value::bool(b),
        serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => vm.intern(&s),
        serde_json::Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(json_to_value(vm, item)?);
            }
            vm.new_array(values)
        }
        serde_json::Value::Object(map) => {
            let dict = vm.new_dictionary();
            let Some(handle) = dict.as_object() else {
                return Ok(Value::NIL);
            };
            for (key, item) in map {
                let key = vm.intern(&key);
                let item = json_to_value(vm, item)?;
                vm.heap_mut().mutate(handle, |obj| {
                    if let ObjData::Dictionary(d) = &mut obj.data {
                        d.entries.insert(key, item);
                    }
                })?;
            }
            dict
        }
    })
}

fn value_to_json(vm: &VM, value: Value, depth: usize) -> Result<serde_json::Value, VmError> {
    if depth > MAX_JSON_DEPTH {
        return Err(VmError::Runtime(
            "JSON stringify error: value nests too deeply".into(),
        ));
    }
    if value.is_nil() {
        return Ok(serde_json::Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(serde_json::Value::Bool(b));
    }
    if let Some(n) = value.as_number() {
        // JSON has no Infinity or NaN
        return Ok(serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null));
    }

    let Some(r) = value.as_object() else {
        return Ok(serde_json::Value::Null);
    };
    match &vm.heap().get(r)?.data {
        ObjData::String(s) => Ok(serde_json::Value::String(s.chars.to_string())),
        ObjData::Array(array) => array
            .items
            .iter()
            .map(|item| value_to_json(vm, *item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        ObjData::Dictionary(dict) => {
            let mut map = serde_json::Map::new();
            for (key, item) in &dict.entries {
                let key = match vm.heap().as_str(*key) {
                    Some(text) => text.to_string(),
                    None => vm.display(*key),
                };
                map.insert(key, value_to_json(vm, *item, depth + 1)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        ObjData::Instance(instance) => {
            let mut map = serde_json::Map::new();
            for (name, item) in &instance.fields {
                let name = vm.heap().string(*name)?.to_string();
                map.insert(name, value_to_json(vm, *item, depth + 1)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        _ => Ok(serde_json::Value::String(vm.display(value))),
    }
}
