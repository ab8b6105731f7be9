//! The fixed GraphQL operations the proxy forwards, and how their results
//! are unwrapped when upstream data is missing.

use std::collections::HashSet;

use serde_json::{json, Value};

pub const VIDEOGAME_BY_NAME: &str = r#"
query GameId($name:String!){
  videogames(query:{ filter:{ name:$name } }){
    nodes { id name }
  }
}"#;

pub const TOURNAMENTS_BY_GAME_AND_COUNTRY: &str = r#"
query TournamentsByGameAndCountry($perPage:Int!,$c:String!,$g:[ID]){
  tournaments(query:{
    page:1,
    perPage:$perPage,
    sortBy:"startAt asc",
    filter:{ upcoming:true, countryCode:$c, videogameIds:$g }
  }){
    nodes { id name slug city startAt endAt countryCode }
  }
}"#;

pub const EVENTS_IN_TOURNAMENT: &str = r#"
query EventsInTournament($slug:String!){
  tournament(slug:$slug){
    id
    name
    events{
      id
      name
      slug
      videogame{ id name }
    }
  }
}"#;

pub const EVENT_ENTRANTS: &str = r#"
query EventEntrants($eventId:ID!,$page:Int!,$perPage:Int!){
  event(id:$eventId){
    entrants(query:{page:$page, perPage:$perPage}){
      pageInfo{ total totalPages }
      nodes{ id name }
    }
  }
}"#;

pub const EVENT_SETS: &str = r#"
query EventSets($eventId:ID!,$page:Int!,$perPage:Int!){
  event(id:$eventId){
    sets(page:$page, perPage:$perPage, sortType:STANDARD){
      pageInfo{ total }
      nodes{
        id
        round
        slots{ entrant{ id name } }
      }
    }
  }
}"#;

/// Trims names, drops anything of one character or less and removes
/// duplicates while keeping first-seen order.
pub fn normalize_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| n.chars().count() > 1)
        .filter(|n| seen.insert(n.to_string()))
        .map(str::to_string)
        .collect()
}

/// Flattens per-name videogame lookups into one list, unique by `id`.
pub fn merge_videogames(responses: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    responses
        .iter()
        .flat_map(|data| nodes(data.pointer("/videogames/nodes")))
        .filter(|node| !node.is_null())
        .filter(|node| seen.insert(node.get("id").cloned().unwrap_or(Value::Null).to_string()))
        .collect()
}

pub fn tournaments(data: &Value) -> Value {
    Value::Array(nodes(data.pointer("/tournaments/nodes")))
}

pub fn events(data: &Value) -> Value {
    Value::Array(nodes(data.pointer("/tournament/events")))
}

pub fn entrants(data: &Value) -> Value {
    present(data.pointer("/event/entrants"))
        .unwrap_or_else(|| json!({ "pageInfo": { "total": 0, "totalPages": 0 }, "nodes": [] }))
}

pub fn sets(data: &Value) -> Value {
    present(data.pointer("/event/sets"))
        .unwrap_or_else(|| json!({ "pageInfo": { "total": 0 }, "nodes": [] }))
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn nodes(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
