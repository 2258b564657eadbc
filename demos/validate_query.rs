use eql_core::{analyze, ClauseRegistry};

fn main() {
    let types = r#"{
        "search": {
            "type": { "index": "string", "query": "clause", "size": "number" },
            "required": ["index"],
            "strict": true
        },
        "clause": { "type": ["term", "range"] },
        "term": { "type": { "term": "{string:string}" }, "required": ["term"] },
        "range": { "type": { "range": "{string:bounds}" }, "required": ["range"] },
        "bounds": { "type": { "gt": "number", "lt": "number" } }
    }"#;

    let query = r#"{
        "index": "people",
        "query": {"range": {"age": {"gt": "thirty"}}},
        "size": 10,
        "from": 5
    }"#;

    let registry = match ClauseRegistry::from_json_str(types) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to compile types: {:?}", miette::Report::new(e));
            return;
        }
    };

    match analyze(query, "query.json", &registry, "search") {
        Ok(result) if result.is_valid() => {
            let json_output = result.to_json().unwrap();
            println!("Query is valid:\n{json_output}");
        }
        Ok(result) => {
            println!("{}", result.render_report());
        }
        Err(e) => {
            eprintln!("Failed to analyze query: {:?}", miette::Report::new(e));
        }
    }
}
