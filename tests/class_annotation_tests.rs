//! Class annotation: wrapping, marker idempotence, inheritance and
//! receiver binding

use runledger::call_site::{CallSite, CallerContext};
use runledger::class::{annotate, CallArgs, ClassDef, Invocation};
use runledger::classifier::MemberSignature;
use runledger::fingerprint::FingerprintBuilder;
use runledger::ledger::{InvocationLedger, MemoryLedger};
use runledger::tracer::Tracer;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Page {
    url: String,
}

fn tracer() -> (Tracer, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    let tracer = Tracer::new(ledger.clone(), FingerprintBuilder::new("test_").unwrap());
    (tracer, ledger)
}

fn ctx(line: u32) -> CallerContext {
    CallerContext::new(CallSite::new("tests/test_pages.rs", line, "test_open"))
        .with_receiver_text("suite::test_pages::PageTest")
}

fn page_class(hits: Arc<AtomicUsize>) -> ClassDef<Page> {
    ClassDef::new("Page")
        .method(
            MemberSignature::method("open").param("path"),
            move |inv: Invocation<'_, Page>| {
                hits.fetch_add(1, Ordering::SeqCst);
                let base = inv.receiver.map(|p| p.url.clone()).unwrap_or_default();
                let path = inv.args.get(0).and_then(Value::as_str).unwrap_or("");
                Ok(json!(format!("{}{}", base, path)))
            },
        )
        .method(
            MemberSignature::function("normalize").param("path"),
            |inv: Invocation<'_, Page>| {
                // Static: must never observe a receiver
                Ok(json!({
                    "had_receiver": inv.receiver.is_some(),
                    "path": inv.args.get(0).cloned().unwrap_or(Value::Null),
                }))
            },
        )
        .method(
            MemberSignature::function("new").param("url"),
            |inv: Invocation<'_, Page>| Ok(json!(inv.receiver.is_some())),
        )
        .attribute("retries", 3)
}

#[test]
fn test_annotate_twice_wraps_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (tracer, ledger) = tracer();
    let mut class = page_class(hits.clone());

    annotate(&mut class, &tracer);
    annotate(&mut class, &tracer);

    let page = Page {
        url: "https://example.test".into(),
    };
    let args = CallArgs::new().arg("/login");
    let first = class.bind(&page).call(&ctx(10), "open", &args).unwrap();
    let second = class.bind(&page).call(&ctx(10), "open", &args).unwrap();

    assert_eq!(first, json!("https://example.test/login"));
    assert_eq!(second, Value::Null);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    // A double wrapper would record the same edge twice or skip the body
    assert_eq!(ledger.len(), 1);
}

#[test]
fn test_subclass_annotation_keeps_parent_wrappers() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (tracer, ledger) = tracer();
    let mut base = page_class(hits.clone());
    annotate(&mut base, &tracer);

    let mut login = ClassDef::inherit("LoginPage", &base)
        .method(MemberSignature::method("submit"), |_| Ok(json!("submitted")));
    annotate(&mut login, &tracer);

    assert!(login.member("open").unwrap().is_traced());
    assert!(login.member("submit").unwrap().is_traced());
    assert_eq!(login.member("open").unwrap().owner(), "Page");

    let page = Page {
        url: "https://example.test".into(),
    };
    login
        .bind(&page)
        .call(&ctx(20), "open", &CallArgs::new().arg("/"))
        .unwrap();
    login
        .bind(&page)
        .call(&ctx(21), "submit", &CallArgs::new())
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let callees: Vec<String> = ledger
        .entries()
        .unwrap()
        .iter()
        .map(|fp| fp.callee())
        .collect();
    assert_eq!(callees, vec!["Page.open", "LoginPage.submit"]);
}

#[test]
fn test_static_member_called_without_receiver() {
    let (tracer, _) = tracer();
    let mut class = page_class(Arc::new(AtomicUsize::new(0)));
    annotate(&mut class, &tracer);

    let page = Page { url: String::new() };
    let out = class
        .bind(&page)
        .call(&ctx(30), "normalize", &CallArgs::new().arg("/a"))
        .unwrap();

    assert_eq!(out["had_receiver"], json!(false));
    assert_eq!(out["path"], json!("/a"));
}

#[test]
fn test_constructor_keeps_receiver() {
    let (tracer, _) = tracer();
    let mut class = page_class(Arc::new(AtomicUsize::new(0)));
    annotate(&mut class, &tracer);

    let page = Page { url: String::new() };
    let out = class
        .bind(&page)
        .call(&ctx(40), "new", &CallArgs::new().arg("https://example.test"))
        .unwrap();
    assert_eq!(out, json!(true));
}

#[test]
fn test_class_level_call_without_receiver() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (tracer, _) = tracer();
    let mut class = page_class(hits.clone());
    annotate(&mut class, &tracer);

    // No receiver available: binding is skipped, the body still runs
    let out = class
        .invoke(None, "open", &CallArgs::new().arg("/x"), &ctx(50))
        .unwrap();
    assert_eq!(out, json!("/x"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_attributes_untouched() {
    let (tracer, _) = tracer();
    let mut class = page_class(Arc::new(AtomicUsize::new(0)));
    annotate(&mut class, &tracer);

    assert!(!class.member("retries").unwrap().is_traced());
    assert_eq!(class.attribute_value("retries"), Some(&json!(3)));
}

#[test]
fn test_fingerprint_uses_caller_class() {
    let (tracer, ledger) = tracer();
    let mut class = page_class(Arc::new(AtomicUsize::new(0)));
    annotate(&mut class, &tracer);

    let page = Page { url: String::new() };
    class
        .bind(&page)
        .call(&ctx(60), "open", &CallArgs::new())
        .unwrap();

    let entries = ledger.entries().unwrap();
    assert_eq!(
        entries[0].to_string(),
        "tests/test_pages.rs-PageTest-test_open-Page-open-60"
    );
}

#[test]
fn test_member_error_propagates_and_stays_recorded() {
    let (tracer, ledger) = tracer();
    let mut class: ClassDef<Page> = ClassDef::new("Page").method(
        MemberSignature::method("crash"),
        |_| Err(anyhow::anyhow!("element not found")),
    );
    annotate(&mut class, &tracer);

    let page = Page { url: String::new() };
    let err = class
        .bind(&page)
        .call(&ctx(70), "crash", &CallArgs::new())
        .unwrap_err();
    assert!(err.to_string().contains("element not found"));
    assert_eq!(ledger.len(), 1);

    let again = class
        .bind(&page)
        .call(&ctx(70), "crash", &CallArgs::new())
        .unwrap();
    assert_eq!(again, Value::Null);
}
