//! Dynamic ABI encoding for arbitrary contract calls.
//!
//! JSON arguments are coerced against the declared Solidity parameter types:
//! strings go through [`DynSolType::coerce_str`], numbers and booleans are
//! stringified first, and JSON arrays map onto Solidity arrays and tuples
//! recursively. Decoded outputs are rendered back to JSON with integers as
//! decimal strings so no precision is lost.

use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{Function, JsonAbi};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// A contract function call described by a JSON ABI.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCall {
    /// Contract address.
    pub contract_address: String,
    /// JSON ABI, either as an array or as its string form.
    pub abi: Value,
    /// Function to call.
    pub function_name: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ContractCall {
    /// Resolves the target function and ABI-encodes the call data.
    ///
    /// Overloads are disambiguated by argument count.
    pub(super) fn encode(&self) -> Result<(Function, Vec<u8>), Error> {
        let abi = parse_abi(&self.abi)?;
        let function = select_function(&abi, &self.function_name, self.args.len())?;
        let values = function
            .inputs
            .iter()
            .zip(&self.args)
            .map(|(param, arg)| {
                let ty = param.resolve().map_err(|e| {
                    Error::invalid_input(format!("parameter '{}': {e}", param.name))
                })?;
                coerce(&ty, arg).map_err(|e| {
                    Error::invalid_input(format!("argument '{}' ({}): {e}", param.name, param.ty))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data = function
            .abi_encode_input(&values)
            .map_err(|e| Error::invalid_input(format!("encoding {}: {e}", self.function_name)))?;
        Ok((function.clone(), data))
    }
}

fn parse_abi(abi: &Value) -> Result<JsonAbi, Error> {
    let parsed = match abi {
        Value::String(text) => serde_json::from_str(text),
        other => serde_json::from_value(other.clone()),
    };
    parsed.map_err(|e| Error::invalid_input(format!("invalid ABI: {e}")))
}

fn select_function<'a>(abi: &'a JsonAbi, name: &str, arity: usize) -> Result<&'a Function, Error> {
    let overloads = abi
        .function(name)
        .ok_or_else(|| Error::invalid_input(format!("function '{name}' not found in ABI")))?;
    overloads
        .iter()
        .find(|f| f.inputs.len() == arity)
        .ok_or_else(|| {
            Error::invalid_input(format!("function '{name}' takes no overload with {arity} arguments"))
        })
}

fn coerce(ty: &DynSolType, value: &Value) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Array(inner), Value::Array(items)) => items
            .iter()
            .map(|item| coerce(inner, item))
            .collect::<Result<_, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) => {
            if items.len() != *len {
                return Err(format!("expected {len} elements, got {}", items.len()));
            }
            items
                .iter()
                .map(|item| coerce(inner, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), Value::Array(items)) => {
            if items.len() != types.len() {
                return Err(format!("expected {} tuple fields, got {}", types.len(), items.len()));
            }
            types
                .iter()
                .zip(items)
                .map(|(ty, item)| coerce(ty, item))
                .collect::<Result<_, _>>()
                .map(DynSolValue::Tuple)
        }
        (_, Value::String(text)) => ty.coerce_str(text).map_err(|e| e.to_string()),
        (_, Value::Number(number)) => ty.coerce_str(&number.to_string()).map_err(|e| e.to_string()),
        (_, Value::Bool(flag)) => ty
            .coerce_str(if *flag { "true" } else { "false" })
            .map_err(|e| e.to_string()),
        (_, other) => Err(format!("cannot coerce {other} to {}", ty.sol_type_name())),
    }
}

/// Renders decoded outputs as JSON; a single output is unwrapped.
pub(super) fn outputs_to_json(values: &[DynSolValue]) -> Value {
    match values {
        [single] => to_json(single),
        many => Value::Array(many.iter().map(to_json).collect()),
    }
}

#[allow(unreachable_patterns)]
fn to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(flag) => Value::Bool(*flag),
        DynSolValue::Int(int, _) => Value::String(int.to_string()),
        DynSolValue::Uint(uint, _) => Value::String(uint.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Function(function) => Value::String(function.to_string()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(text) => Value::String(text.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(to_json).collect())
        }
        _ => Value::Null,
    }
}
