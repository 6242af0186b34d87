//! 动作参数 JSON Schema 生成（schemars 自动生成）
//!
//! 生成的 schema 作为函数调用参数描述交给决策引擎；子 schema 内联，去掉 `$schema` / `title`，
//! 兼容只接受扁平 schema 的 OpenAI 兼容端点。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

/// 返回 T 的参数 schema（JSON object）
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.option_add_null_type = false;
    });
    let schema = settings.into_generator().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}));
    if let Some(fields) = value.as_object_mut() {
        fields.remove("$schema");
        fields.remove("title");
        fields.remove("definitions");
    }
    value
}
