// example/src/main.rs

use brine_pb::*;

const PLAYER_PROTO: &str = include_str!("../proto/player.proto");

fn object<'a>(name: &'a str, fields: Vec<(&'a str, Value<'a>)>) -> Value<'a> {
    Value::Object(name, fields.into_iter().collect())
}

fn main() -> Result<(), ProtoError> {
    let mut schema = compile_sources(&[PLAYER_PROTO], &CompileOptions::default())?;

    // Each packet on the wire is a Player preceded by a varint length.
    schema.add_framed("my.game.PlayerPacket", "my.game.Player", Some("uint32"), None)?;

    let stat = |key: &str, value: i32| {
        object(
            "my.game.Player_stats_entry",
            vec![("key", Value::String(key.to_string())), ("value", Value::Int32(value))],
        )
    };

    let player = object(
        "my.game.Player",
        vec![
            ("id", Value::Int32(123)),
            ("name", Value::String("PlayerOne".to_string())),
            ("state", Value::Enum("my.game.Player.PlayerState", "ACTIVE")),
            (
                "pos",
                object(
                    "my.game.Player.Position",
                    vec![("x", Value::Float(10.5)), ("y", Value::Float(20.0)), ("z", Value::Float(-5.25))],
                ),
            ),
            ("items", Value::Array(vec![Value::Int32(100), Value::Int32(200), Value::Int32(300)])),
            ("stats", Value::Array(vec![stat("strength", 15), stat("mana", 100)])),
            ("level", Value::Int32(15)),
            ("achievements", Value::Array(vec![Value::String("first_login".to_string())])),
        ],
    );

    let bytes = schema.write("my.game.PlayerPacket", &player)?;
    println!("encoded {} bytes (size_of = {})", bytes.len(), schema.size_of("my.game.PlayerPacket", &player)?);
    println!("{:02x?}", bytes);

    let (decoded, consumed) = schema.read("my.game.PlayerPacket", &bytes)?;
    println!("consumed {} bytes", consumed);
    println!("{:?}", decoded);

    for (key, value) in decoded.get("stats").map(|stats| stats.map_entries()).unwrap_or_default() {
        println!("  stat {} = {}", key.as_string(), value.as_int32());
    }
    println!("round trip ok: {}", decoded == player);

    Ok(())
}
