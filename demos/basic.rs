use std::collections::HashSet;

use nfr_eval::{evaluate, Features};

fn main() {
    let rules = nfr_dsl::load_rules(
        r#"
- name: intel-cpu
  labels:
    feature.node.kubernetes.io/cpu-vendor: "intel"
  matchFeatures:
    - feature: cpu.model
      matchExpressions:
        GenuineIntel: { op: Exists }
"#,
    )
    .unwrap();

    let features =
        Features::new().with_flag("cpu.model", HashSet::from(["GenuineIntel".to_string()]));

    for rule in &rules {
        let (matched, evidence) = evaluate(rule, &features).unwrap();
        println!("{}: matched={matched} evidence={evidence:?}", rule.name);
    }
}
