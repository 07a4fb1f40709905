use gateway_script::{ScriptError, ScriptHost, ScriptReturn, ScriptSettings, ScriptValue};
use serde_json::json;
use std::time::Duration;

fn host() -> ScriptHost {
    ScriptHost::new(ScriptSettings {
        timeout: Duration::from_millis(200),
        heap_limit_mb: 32,
    })
    .expect("script host")
}

#[tokio::test]
async fn decode_bytes_with_library_helpers() {
    let host = host();
    let program = host
        .compile(
            "meter",
            r#"
            function decode(b) {
              return {
                voltage: gw.u16be(b, 0) / 10,
                current: gw.i16be(b, 2),
                serial: gw.bcd(b, 4, 2),
                crc: gw.crc16(b, 0, 4),
                sum: gw.sum8(b),
              };
            }
            "#,
        )
        .await
        .expect("compile");

    let result = program
        .call("decode", vec![ScriptValue::Bytes(vec![0x08, 0x98, 0xff, 0xfe, 0x12, 0x34])])
        .await
        .expect("call");
    let ScriptReturn::Json(value) = result else {
        panic!("expected object, got {:?}", result);
    };
    assert_eq!(value["voltage"], json!(220));
    assert_eq!(value["current"], json!(-2));
    assert_eq!(value["serial"], json!("1234"));
    assert_eq!(value["sum"], json!((0x08 + 0x98 + 0xff + 0xfe + 0x12 + 0x34) & 0xff));
    assert!(value["crc"].is_number());
}

#[tokio::test]
async fn return_values_map_to_variants() {
    let host = host();
    let program = host
        .compile(
            "shapes",
            r#"
            function nothing() { return null; }
            function text() { return "ok"; }
            function bytes() { return gw.bytes([1, 2, 3]); }
            function list() { return ["a", gw.bytes([9]), { k: 1 }]; }
            "#,
        )
        .await
        .expect("compile");

    assert_eq!(program.call("nothing", vec![]).await, Ok(ScriptReturn::Undefined));
    assert_eq!(
        program.call("text", vec![]).await,
        Ok(ScriptReturn::Text("ok".to_string()))
    );
    assert_eq!(
        program.call("bytes", vec![]).await,
        Ok(ScriptReturn::Bytes(vec![1, 2, 3]))
    );
    assert_eq!(
        program.call("list", vec![]).await,
        Ok(ScriptReturn::List(vec![
            ScriptReturn::Text("a".to_string()),
            ScriptReturn::Bytes(vec![9]),
            ScriptReturn::Json(json!({"k": 1})),
        ]))
    );
}

#[tokio::test]
async fn programs_do_not_share_globals() {
    let host = host();
    let first = host
        .compile("a", "var counter = 10; function read() { return counter; }")
        .await
        .expect("a");
    let second = host
        .compile("b", "function read() { return typeof counter; }")
        .await
        .expect("b");

    assert_eq!(first.call("read", vec![]).await, Ok(ScriptReturn::Number(10.0)));
    assert_eq!(
        second.call("read", vec![]).await,
        Ok(ScriptReturn::Text("undefined".to_string()))
    );
}

#[tokio::test]
async fn sandbox_has_no_webassembly() {
    let host = host();
    let program = host
        .compile("wasm", "function wasm() { return typeof WebAssembly; }")
        .await
        .expect("compile");
    assert_eq!(
        program.call("wasm", vec![]).await,
        Ok(ScriptReturn::Text("undefined".to_string()))
    );
}

#[tokio::test]
async fn endless_loop_times_out_and_host_recovers() {
    let host = host();
    let program = host
        .compile(
            "spin",
            "function spin() { while (true) {} } function ping() { return 1; }",
        )
        .await
        .expect("compile");

    let err = program.call("spin", vec![]).await.expect_err("timeout");
    assert!(matches!(err, ScriptError::Timeout(_)), "got {:?}", err);
    assert_eq!(program.call("ping", vec![]).await, Ok(ScriptReturn::Number(1.0)));
}

#[tokio::test]
async fn errors_are_reported() {
    let host = host();
    let err = host.compile("broken", "function (").await.expect_err("syntax");
    assert!(matches!(err, ScriptError::Compile { ref name, .. } if name == "broken"));

    let program = host
        .compile("thrower", "function boom() { throw new Error('bad frame'); }")
        .await
        .expect("compile");
    match program.call("boom", vec![]).await {
        Err(ScriptError::Runtime(message)) => assert!(message.contains("bad frame")),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        program.call("missing", vec![]).await,
        Err(ScriptError::MissingFunction("missing".to_string()))
    );
    assert_eq!(program.has_function("boom").await, Ok(true));
    assert_eq!(program.has_function("missing").await, Ok(false));
}

#[tokio::test]
async fn dropping_last_handle_releases_program() {
    let host = host();
    let program = host.compile("tmp", "function f() {}").await.expect("compile");
    let copy = program.clone();
    assert_eq!(host.program_count().await, Ok(1));
    drop(program);
    assert_eq!(host.program_count().await, Ok(1));
    drop(copy);
    assert_eq!(host.program_count().await, Ok(0));
}

#[tokio::test]
async fn timeouts_fire_on_every_call() {
    let host = host();
    let program = host
        .compile(
            "spin",
            "function spin() { while (true) {} } function ping() { return 2; }",
        )
        .await
        .expect("compile");

    for _ in 0..3 {
        let err = program.call("spin", vec![]).await.expect_err("timeout");
        assert!(matches!(err, ScriptError::Timeout(_)), "got {:?}", err);
        assert_eq!(program.call("ping", vec![]).await, Ok(ScriptReturn::Number(2.0)));
    }
}

#[tokio::test]
async fn heap_exhaustion_is_stopped_and_host_recovers() {
    let host = ScriptHost::new(ScriptSettings {
        timeout: Duration::from_secs(10),
        heap_limit_mb: 32,
    })
    .expect("script host");
    let program = host
        .compile(
            "hog",
            r#"
            function hog() {
              const parts = [];
              while (true) { parts.push(new Array(100000).fill(1.5)); }
            }
            function ping() { return 3; }
            "#,
        )
        .await
        .expect("compile");

    let err = program.call("hog", vec![]).await.expect_err("heap limit");
    assert_eq!(err, ScriptError::HeapLimit(32));
    assert_eq!(program.call("ping", vec![]).await, Ok(ScriptReturn::Number(3.0)));

    let err = program.call("hog", vec![]).await.expect_err("heap limit again");
    assert_eq!(err, ScriptError::HeapLimit(32));
}

#[tokio::test]
async fn cyclic_and_oversized_results_are_rejected() {
    let host = host();
    let program = host
        .compile(
            "shapes",
            r#"
            function selfList() { const a = []; a.push(a); return a; }
            function selfObject() { const o = {}; o.me = o; return o; }
            function fanOut() {
              let a = [1, 2, 3, 4];
              for (let i = 0; i < 20; i++) { a = [a, a]; }
              return a;
            }
            function nested() { return [[[1]]]; }
            "#,
        )
        .await
        .expect("compile");

    for func in ["selfList", "selfObject", "fanOut"] {
        match program.call(func, vec![]).await {
            Err(ScriptError::Runtime(_)) => {}
            other => panic!("{func}: unexpected {:?}", other),
        }
    }
    assert_eq!(
        program.call("nested", vec![]).await,
        Ok(ScriptReturn::List(vec![ScriptReturn::List(vec![ScriptReturn::List(vec![
            ScriptReturn::Number(1.0)
        ])])]))
    );
}
