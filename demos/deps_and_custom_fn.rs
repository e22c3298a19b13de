use std::collections::HashMap;

use nfr_eval::Features;

fn main() {
    let features = Features::new().with_attribute(
        "kernel.version",
        HashMap::from([("major".to_string(), "6".to_string())]),
    );

    let rules = nfr_dsl::load_rules(
        r#"
- name: modern-kernel
  matchFeatures:
    - feature: kernel.version
      matchExpressions:
        major: { op: Gt, value: ["5"] }
"#,
    )
    .unwrap();

    for rule in &rules {
        let (matched, evidence) = nfr_eval::evaluate(rule, &features).unwrap();
        println!("{}: matched={matched} evidence={evidence:?}", rule.name);
    }
}
