//! Dispatcher integration tests: a misbehaving rule must not disturb the others.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use dotlint::{
    assembly::Instruction,
    config::AnalysisConfig,
    dispatch::{
        Dispatcher, EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions,
        RULE_FAILED_CHECK_ID,
    },
    metadata::{Assembly, AssemblyBuilder, MethodAttributes, TargetRuntime},
    report::{DiagnosticKind, Location, Severity, ViolationLog},
    rules::ZeroDivide,
    Result,
};

static EXPLODING: RuleInfo = RuleInfo {
    check_id: "X0001",
    name: "Exploding",
    severity: Severity::Nitpick,
    category: "Testing",
    min_runtime: None,
    description: "panics on every return",
};

static COUNTING: RuleInfo = RuleInfo {
    check_id: "X0002",
    name: "Counting",
    severity: Severity::Nitpick,
    category: "Testing",
    min_runtime: None,
    description: "counts returns",
};

struct Exploding {
    calls: Arc<AtomicUsize>,
}

impl Rule for Exploding {
    type MethodState = ();

    fn info(&self) -> &'static RuleInfo {
        &EXPLODING
    }

    fn register(&self, events: &mut Subscriptions) {
        events.on(EventKind::Return);
    }

    fn visit_instruction(
        &mut self,
        _state: &mut (),
        _instruction: &Instruction,
        view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("cannot handle {}", view.full_name());
    }
}

struct Counting {
    calls: Arc<AtomicUsize>,
}

impl Rule for Counting {
    type MethodState = ();

    fn info(&self) -> &'static RuleInfo {
        &COUNTING
    }

    fn register(&self, events: &mut Subscriptions) {
        events.on(EventKind::Return);
    }

    fn visit_instruction(
        &mut self,
        _state: &mut (),
        _instruction: &Instruction,
        _view: &MethodView<'_>,
        _cx: &mut RuleContext<'_>,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Three methods dividing by zero, plus one whose body cannot be decoded.
fn assembly() -> Result<Assembly> {
    let mut builder = AssemblyBuilder::new("Isolation", TargetRuntime::V4_0);
    let ty = builder.add_type("N", "Calc");
    let attributes = MethodAttributes::PUBLIC | MethodAttributes::STATIC;
    for name in ["First", "Second", "Third"] {
        let method = builder.add_method(ty, name, attributes, &["System.Int32"], "System.Int32");
        // ldarg.0; ldc.i4.0; div; ret
        builder.set_code(method, vec![0x02, 0x16, 0x5B, 0x2A])?;
    }
    let broken = builder.add_method(ty, "Broken", attributes, &[], "System.Void");
    // br.s without its displacement
    builder.set_code(broken, vec![0x2B])?;
    Ok(builder.build())
}

#[test]
fn failing_rule_is_isolated() -> Result<()> {
    let exploded = Arc::new(AtomicUsize::new(0));
    let counted = Arc::new(AtomicUsize::new(0));
    let config = AnalysisConfig::default();

    let mut dispatcher = Dispatcher::new(&config);
    dispatcher.register(Exploding {
        calls: exploded.clone(),
    });
    dispatcher.register(ZeroDivide);
    dispatcher.register(Counting {
        calls: counted.clone(),
    });

    let mut log = ViolationLog::new();
    dispatcher.dispatch(&assembly()?, &mut log);

    // disabled after the first panic, the other rules saw every method
    assert_eq!(exploded.load(Ordering::SeqCst), 1);
    assert_eq!(counted.load(Ordering::SeqCst), 3);
    assert_eq!(dispatcher.failed_rules(), vec!["X0001"]);
    assert_eq!(log.by_check("C1025").count(), 3);

    let failures: Vec<_> = log.by_check(RULE_FAILED_CHECK_ID).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(
        failures[0].location,
        Location::Assembly {
            name: "Isolation".into()
        }
    );
    assert!(failures[0].details.contains("X0001"));

    let kinds: Vec<_> = dispatcher.diagnostics().iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DiagnosticKind::RuleFailed));
    assert!(kinds.contains(&DiagnosticKind::MethodSkipped));
    Ok(())
}

#[test]
fn registration_order_is_dispatch_order() -> Result<()> {
    let config = AnalysisConfig::default();
    let mut dispatcher = Dispatcher::new(&config);
    dispatcher.register(Counting {
        calls: Arc::new(AtomicUsize::new(0)),
    });
    dispatcher.register(ZeroDivide);

    let ids: Vec<_> = dispatcher.rules().map(|info| info.check_id).collect();
    assert_eq!(ids, vec!["X0002", "C1025"]);
    assert_eq!(dispatcher.rule_count(), 2);
    Ok(())
}
