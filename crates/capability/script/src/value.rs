use serde_json::Value;

/// 传入脚本的参数。
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// 以 Uint8Array 传入
    Bytes(Vec<u8>),
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&[u8]> for ScriptValue {
    fn from(bytes: &[u8]) -> Self {
        ScriptValue::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for ScriptValue {
    fn from(bytes: Vec<u8>) -> Self {
        ScriptValue::Bytes(bytes)
    }
}

impl From<&str> for ScriptValue {
    fn from(text: &str) -> Self {
        ScriptValue::Text(text.to_string())
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

/// 脚本返回值。
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptReturn {
    /// undefined 或 null
    Undefined,
    Text(String),
    Number(f64),
    Bool(bool),
    /// 普通对象（经 JSON.stringify 转换）
    Json(Value),
    /// Uint8Array / ArrayBuffer / 其它 TypedArray 的原始字节
    Bytes(Vec<u8>),
    /// 数组，元素逐个转换
    List(Vec<ScriptReturn>),
}

impl ScriptReturn {
    pub fn is_undefined(&self) -> bool {
        matches!(self, ScriptReturn::Undefined)
    }

    /// 转为 JSON 值；字节按数字数组表示。
    pub fn into_json(self) -> Value {
        match self {
            ScriptReturn::Undefined => Value::Null,
            ScriptReturn::Text(text) => Value::String(text),
            ScriptReturn::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ScriptReturn::Bool(b) => Value::Bool(b),
            ScriptReturn::Json(value) => value,
            ScriptReturn::Bytes(bytes) => {
                Value::Array(bytes.into_iter().map(Value::from).collect())
            }
            ScriptReturn::List(items) => {
                Value::Array(items.into_iter().map(ScriptReturn::into_json).collect())
            }
        }
    }
}
