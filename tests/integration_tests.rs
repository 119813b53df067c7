// Integration tests for refpack using the fixture trees under tests/fixtures
use pretty_assertions::assert_eq;
use refpack::{bundle_file, expand_file, separate_file, BundleOptions, SeparateOptions, Value};
use serde_json::json;
use std::path::PathBuf;

fn fixture(subdir: &str, filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(subdir)
        .join(filename)
}

fn bundle_ok(subdir: &str, filename: &str) -> Value {
    let path = fixture(subdir, filename);
    match bundle_file(&path, &BundleOptions::default()) {
        Ok(output) => output.document,
        Err(err) => panic!("{:?}", miette::Report::from(err)),
    }
}

fn petstore_bundle() -> serde_json::Value {
    json!({
        "swagger": "2.0",
        "info": {"title": "petstore", "version": "1.0"},
        "paths": {
            "/pets": {
                "get": {
                    "parameters": [{"$ref": "#/parameters/limit"}],
                    "responses": {
                        "200": {
                            "description": "pets",
                            "schema": {"type": "array", "items": {"$ref": "#/definitions/Pet"}}
                        },
                        "default": {"$ref": "#/responses/Error"}
                    }
                }
            }
        },
        "definitions": {
            "Error": {"type": "object", "properties": {"message": {"type": "string"}}},
            "Pet": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "tag": {"$ref": "#/definitions/Tag"}
                }
            },
            "Tag": {"type": "string"}
        },
        "parameters": {"limit": {"name": "limit", "in": "query", "type": "integer"}},
        "responses": {
            "Error": {"description": "error", "schema": {"$ref": "#/definitions/Error"}}
        }
    })
}

mod bundle_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_petstore_bundle() {
        let bundled = bundle_ok("petstore", "main.yaml");
        assert_eq!(bundled, Value::from(petstore_bundle()));
    }

    #[test]
    fn test_petstore_bundle_has_no_external_refs() {
        let bundled = bundle_ok("petstore", "main.yaml");
        for (_, reference) in refpack::value::collect_refs(&bundled) {
            assert!(reference.starts_with("#/"), "external ref left: {reference}");
        }
    }

    #[test]
    fn test_petstore_items_are_named_once() {
        let path = fixture("petstore", "main.yaml");
        let output = bundle_file(&path, &BundleOptions::default()).unwrap();
        let mut names: Vec<_> = output.items.iter().map(|(name, _)| name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "definitions/Error",
                "definitions/Pet",
                "definitions/Tag",
                "parameters/limit",
                "paths/pets",
                "responses/Error",
            ]
        );
    }

    #[test]
    fn test_openapi3_bundle_uses_components() {
        let bundled = bundle_ok("openapi3", "main.yaml");
        let expected = json!({
            "openapi": "3.0.3",
            "info": {"title": "pets", "version": "1.0"},
            "paths": {
                "/pets": {
                    "post": {
                        "requestBody": {"$ref": "#/components/requestBodies/PetBody"},
                        "responses": {
                            "200": {
                                "description": "created",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/pet"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "requestBodies": {
                    "PetBody": {
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/pet"}
                            }
                        }
                    }
                },
                "schemas": {
                    "pet": {"type": "object", "properties": {"name": {"type": "string"}}}
                }
            }
        });
        assert_eq!(bundled, Value::from(expected));
    }

    #[test]
    fn test_bundling_a_bundle_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundled.yaml");
        let bundled = bundle_ok("petstore", "main.yaml");
        refpack::format::dump_file(&bundled, &path, refpack::format::Format::Yaml).unwrap();

        let again = bundle_file(&path, &BundleOptions::default()).unwrap();
        assert_eq!(again.document, bundled);
    }
}

mod expand_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_petstore_expand() {
        let path = fixture("petstore", "main.yaml");
        let expanded = expand_file(&path).unwrap().document;

        let error = json!({"type": "object", "properties": {"message": {"type": "string"}}});
        let expected = json!({
            "swagger": "2.0",
            "info": {"title": "petstore", "version": "1.0"},
            "paths": {
                "/pets": {
                    "get": {
                        "parameters": [{"name": "limit", "in": "query", "type": "integer"}],
                        "responses": {
                            "200": {
                                "description": "pets",
                                "schema": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "name": {"type": "string"},
                                            "tag": {"type": "string"}
                                        }
                                    }
                                }
                            },
                            "default": {"description": "error", "schema": error.clone()}
                        }
                    }
                }
            },
            "definitions": {"Error": error}
        });
        assert_eq!(expanded, Value::from(expected));
    }

    #[test]
    fn test_openapi3_expand_leaves_no_refs() {
        let path = fixture("openapi3", "main.yaml");
        let expanded = expand_file(&path).unwrap().document;
        assert!(!expanded.contains_ref());
    }
}

mod separate_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn separate_petstore(out: &std::path::Path) -> refpack::separator::Separated {
        let work = out.parent().unwrap();
        let bundled_path = work.join("bundled.yaml");
        let bundled = bundle_ok("petstore", "main.yaml");
        refpack::format::dump_file(&bundled, &bundled_path, refpack::format::Format::Yaml).unwrap();
        separate_file(&bundled_path, out, &SeparateOptions::default()).unwrap()
    }

    #[test]
    fn test_separate_petstore_layout() {
        let work = tempfile::tempdir().unwrap();
        let out = work.path().join("out");
        let separated = separate_petstore(&out);

        let mut files: Vec<_> = separated
            .fragments
            .iter()
            .map(|f| f.path.to_string_lossy().replace('\\', "/"))
            .collect();
        files.sort();
        assert_eq!(
            files,
            vec![
                "definitions/Error.yaml",
                "definitions/Pet.yaml",
                "definitions/Tag.yaml",
                "parameters/limit.yaml",
                "responses/Error.yaml",
            ]
        );

        let error_response = separated.fragment("responses/Error.yaml").unwrap();
        assert_eq!(
            error_response.content,
            Value::from(json!({
                "responses": {
                    "Error": {
                        "description": "error",
                        "schema": {"$ref": "../definitions/Error.yaml#/definitions/Error"}
                    }
                }
            }))
        );

        // Only the entries main itself uses keep a placeholder.
        assert_eq!(
            separated.main.get("definitions").unwrap(),
            &Value::from(json!({
                "Pet": {"$ref": "definitions/Pet.yaml#/definitions/Pet"}
            }))
        );
    }

    #[test]
    fn test_separate_then_bundle_round_trips() {
        let work = tempfile::tempdir().unwrap();
        let out = work.path().join("out");
        let separated = separate_petstore(&out);
        separated.write().unwrap();

        let main = out.join(&separated.main_path);
        let rebundled = bundle_file(&main, &BundleOptions::default()).unwrap();
        assert_eq!(rebundled.document, Value::from(petstore_bundle()));
    }

    #[test]
    fn test_write_staged_moves_tree_into_place() {
        let work = tempfile::tempdir().unwrap();
        let out = work.path().join("out");
        let separated = separate_petstore(&out);

        separated.write_staged().unwrap();
        assert!(out.join("main.yaml").is_file());
        assert!(out.join("definitions").join("Pet.yaml").is_file());

        // A second staged write refuses to clobber the directory.
        assert!(separated.write_staged().is_err());

        // No staging directory is left beside the output.
        let leftovers: Vec<_> = std::fs::read_dir(work.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".refpack-"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_round_trip_keeps_unreferenced_definitions() {
        let work = tempfile::tempdir().unwrap();
        let original = Value::from(json!({
            "swagger": "2.0",
            "paths": {"/pets": {"get": {"responses": {"200": {
                "description": "ok",
                "schema": {"$ref": "#/definitions/Pet"}
            }}}}},
            "definitions": {
                "Pet": {"type": "object"},
                "Unused": {"type": "string"}
            }
        }));
        let bundled_path = work.path().join("bundled.yaml");
        refpack::format::dump_file(&original, &bundled_path, refpack::format::Format::Yaml).unwrap();

        let out = work.path().join("out");
        let separated = separate_file(&bundled_path, &out, &SeparateOptions::default()).unwrap();
        assert!(separated.fragment("definitions/Unused.yaml").is_some());
        separated.write().unwrap();

        let rebundled = bundle_file(out.join(&separated.main_path), &BundleOptions::default()).unwrap();
        assert_eq!(rebundled.document, original);
    }

    #[test]
    fn test_separate_json_output() {
        let work = tempfile::tempdir().unwrap();
        let out = work.path().join("out");
        let bundled_path = work.path().join("bundled.yaml");
        let bundled = bundle_ok("petstore", "main.yaml");
        refpack::format::dump_file(&bundled, &bundled_path, refpack::format::Format::Yaml).unwrap();

        let options = SeparateOptions {
            format: Some(refpack::format::Format::Json),
            ..Default::default()
        };
        let separated = separate_file(&bundled_path, &out, &options).unwrap();
        assert_eq!(separated.main_path, PathBuf::from("main.json"));
        assert!(separated.fragment("definitions/Pet.json").is_some());
    }
}
