use assert_cmd::Command;
use std::io::Write;

fn run_with_env(req: &serde_json::Value, envs: &[(&str, &str)]) -> anyhow::Result<String> {
    let mut cmd = Command::cargo_bin("photo-ai-mcp")?;
    for k in ["GEMINI_SECRET_KEY", "AI_TEXT_GENERATION_ENABLED", "KV_REST_API_URL", "PHOTO_AI_MCP_ENABLE_PING"] {
        cmd.env_remove(k);
    }
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let input = serde_json::to_string(req)?;
    let assert = cmd
        .arg("--log-level")
        .arg("warn")
        .write_stdin({
            let mut b = Vec::new();
            writeln!(b, "{}", input).unwrap();
            b
        })
        .assert();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    Ok(output)
}

#[test]
fn mcp_envelope_success_and_invalid_params() -> anyhow::Result<()> {
    let ok_req = serde_json::json!({
        "jsonrpc":"2.0","method":"tools/call","id":1,
        "params":{"name":"photo_thumbnail","arguments":{
            "photo":{"id":"p9","url":"https://cdn.example/p9.jpg","aspectRatio":0.75,"title":"Fog"},
            "camera":{"make":"Leica","model":"Q2 Monochrom"}
        }}
    });
    let out_ok = run_with_env(&ok_req, &[])?;
    assert!(out_ok.contains("\"content\""));
    assert!(out_ok.contains("\"structuredContent\""));
    assert!(out_ok.contains("\"href\":\"/shot-on/leica/q2-monochrom/p9\""));
    assert!(!out_ok.contains("\"isError\":true"));

    // Missing photo => JSON-RPC invalid params
    let bad_req = serde_json::json!({
        "jsonrpc":"2.0","method":"tools/call","id":2,
        "params":{"name":"photo_thumbnail","arguments":{"tag":"x"}}
    });
    let out_bad = run_with_env(&bad_req, &[])?;
    let v: serde_json::Value = serde_json::from_str(&out_bad)?;
    assert_eq!(v["error"]["code"], -32602);
    Ok(())
}

#[test]
fn ping_gating() -> anyhow::Result<()> {
    // Gating: default OFF => no ping in list, ping call => -32601
    let list_req = serde_json::json!({"jsonrpc":"2.0","method":"tools/list","id":3});
    let list_out = run_with_env(&list_req, &[])?;
    assert!(list_out.contains("\"tools\""));
    assert!(!list_out.contains("\"ping\""));

    let ping_call = serde_json::json!({
        "jsonrpc":"2.0","method":"tools/call","id":4,
        "params":{"name":"ping","arguments":{"message":"ok"}}
    });
    let ping_out = run_with_env(&ping_call, &[])?;
    let v: serde_json::Value = serde_json::from_str(&ping_out)?;
    assert!(
        v.get("error").is_some(),
        "expected error for ping when disabled"
    );
    assert_eq!(v["error"]["code"], -32601);

    // Gating: when enabled => ping listed and callable
    let list_on = run_with_env(&list_req, &[("PHOTO_AI_MCP_ENABLE_PING", "true")])?;
    assert!(list_on.contains("\"ping\""));
    let ping_on = run_with_env(&ping_call, &[("PHOTO_AI_MCP_ENABLE_PING", "1")])?;
    assert!(ping_on.contains("\"content\""));
    assert!(ping_on.contains("\"structuredContent\""));
    assert!(ping_on.contains("\"message\":\"ok\""));
    Ok(())
}
