//! Layer merge
//!
//! Objects deep-merge by key, arrays are replaced wholesale, scalars (and
//! null) are overridden by the later layer.

use serde_json::Value;

/// Merge `overlay` on top of `base`
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        // arrays replace, never concatenate
        (_, overlay) => overlay,
    }
}

/// Merge layers in precedence order (last wins)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(json!({"settle_seconds": 5}), json!({"settle_seconds": 10}));
        assert_eq!(result["settle_seconds"], 10);
    }

    #[test]
    fn test_object_deep_merge() {
        let base = json!({"qemu": {"enabled": true, "image": "multiarch/qemu-user-static"}});
        let overlay = json!({"qemu": {"enabled": false}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["qemu"]["enabled"], false);
        assert_eq!(result["qemu"]["image"], "multiarch/qemu-user-static");
    }

    #[test]
    fn test_array_replace() {
        let base = json!({"compose": {"command": ["docker-compose"]}});
        let overlay = json!({"compose": {"command": ["docker", "compose"]}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["compose"]["command"], json!(["docker", "compose"]));
    }

    #[test]
    fn test_add_new_key() {
        let result = deep_merge(json!({"tag": "devel"}), json!({"docker": "podman"}));
        assert_eq!(result["tag"], "devel");
        assert_eq!(result["docker"], "podman");
    }

    #[test]
    fn test_null_override() {
        let result = deep_merge(json!({"tag": "devel"}), json!({"tag": null}));
        assert!(result["tag"].is_null());
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"tag": "devel", "compose": {"host_service": "host"}});
        let host = json!({"tag": "nightly"});
        let project = json!({"compose": {"host_service": "distccd"}});
        let cli = json!({"tag": "release"});

        let result = merge_layers(vec![builtin, host, project, cli]);

        assert_eq!(result["tag"], "release");
        assert_eq!(result["compose"]["host_service"], "distccd");
    }
}
