use refpack::{bundle_value, expand_value, BundleOptions, Value};

fn main() {
    let spec: Value = match serde_yaml::from_str(
        r##"swagger: "2.0"
definitions:
  User:
    type: object
    properties:
      address:
        $ref: "#/definitions/Address"
  Address:
    type: object
    properties:
      street:
        type: string
"##,
    ) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Failed to parse YAML: {e}");
            return;
        }
    };

    match bundle_value(spec.clone(), &BundleOptions::default()) {
        Ok(result) => {
            for (name, target) in &result.items {
                println!("#/{name} <- {target}");
            }
        }
        Err(e) => eprintln!("Failed to bundle: {e:?}"),
    }

    match expand_value(spec) {
        Ok(result) => match result.to_json() {
            Ok(json_output) => println!("Expanded document:\n{json_output}"),
            Err(e) => eprintln!("Failed to serialize: {e}"),
        },
        Err(e) => eprintln!("Failed to expand: {e:?}"),
    }
}
