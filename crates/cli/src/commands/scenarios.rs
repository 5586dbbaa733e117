use payops_agent::sim::{Fault, FaultKind, Scenario, SimulatorConfig};

pub fn run() -> String {
    let mut lines =
        vec!["available scenarios (replay with `payops run --scenario <name>`):".to_string()];

    for scenario in Scenario::ALL {
        let config = SimulatorConfig::for_scenario(scenario, 0);
        let script = if config.faults.is_empty() {
            "no scripted faults".to_string()
        } else {
            config.faults.iter().map(describe).collect::<Vec<_>>().join(", ")
        };
        lines.push(format!("- {scenario}: {script}"));
    }

    lines.join("\n")
}

fn describe(fault: &Fault) -> String {
    let kind = match &fault.kind {
        FaultKind::IssuerOutage { issuer } => format!("issuer_outage({issuer})"),
        FaultKind::RetryStorm => "retry_storm".to_string(),
        FaultKind::MerchantFlood { merchant } => format!("merchant_flood({merchant})"),
    };
    match fault.until_cycle {
        Some(until) => format!("{kind} cycles {}-{}", fault.from_cycle, until),
        None => format!("{kind} from cycle {}", fault.from_cycle),
    }
}
