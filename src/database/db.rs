use super::{
    db_structs::{ApprovedMap, DifficultyRow, MapIdBounds, MapRange, NewScore, ScoreOwner, ScoreRow},
    Connector, DbError, Store
};
use crate::model::structures::{game_mode::GameMode, ranked_status::RankedStatus};
use chrono::NaiveDateTime;
use postgres_types::ToSql;
use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Duration
};
use tokio::runtime::Runtime;
use tokio_postgres::{config::Host, Client, Config, NoTls, Row};
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Blocking PostgreSQL connection.
///
/// Owns a small runtime that drives the socket; callers block on each query.
/// A dropped connection is re-established before the query is retried, so
/// callers only ever see query errors, never a closed client.
pub struct DbClient {
    runtime: Runtime,
    config: Config,
    target: String,
    client: Mutex<Arc<Client>>
}

impl DbClient {
    pub fn connect(connection_str: &str) -> Result<Self, DbError> {
        let config: Config = connection_str.parse()?;
        let target = describe(&config);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("db-runtime")
            .enable_all()
            .build()?;

        let client = runtime.block_on(open(&config)).map_err(|e| DbError::Connect {
            target: target.clone(),
            reason: e.to_string()
        })?;

        info!(%target, "Connected to database");

        Ok(DbClient {
            runtime,
            config,
            target,
            client: Mutex::new(Arc::new(client))
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    // Reconnects until it succeeds
    fn client(&self) -> Arc<Client> {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);

        while client.is_closed() {
            warn!(target_db = %self.target, "Database connection lost, reconnecting");
            match self.runtime.block_on(open(&self.config)) {
                Ok(fresh) => {
                    *client = Arc::new(fresh);
                    info!(target_db = %self.target, "Reconnected to database");
                }
                Err(e) => {
                    error!(target_db = %self.target, error = %e, "Reconnect failed");
                    thread::sleep(RECONNECT_DELAY);
                }
            }
        }

        Arc::clone(&client)
    }

    fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, DbError> {
        loop {
            let client = self.client();
            match self.runtime.block_on(client.query(sql, params)) {
                Err(_) if client.is_closed() => continue,
                result => return result.map_err(DbError::from)
            }
        }
    }

    fn query_opt(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Option<Row>, DbError> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    fn batch_execute(&self, sql: &str) -> Result<(), DbError> {
        loop {
            let client = self.client();
            match self.runtime.block_on(client.batch_execute(sql)) {
                Err(_) if client.is_closed() => continue,
                result => return result.map_err(DbError::from)
            }
        }
    }

    fn score_from_row(row: &Row) -> Result<ScoreRow, DbError> {
        Ok(ScoreRow {
            score_id: row.try_get("score_id")?,
            player_id: row.try_get("user_id")?,
            map_id: row.try_get("beatmap_id")?,
            score: row.try_get("score")?,
            max_combo: row.try_get("maxcombo")?,
            count_300: row.try_get("count300")?,
            count_100: row.try_get("count100")?,
            count_50: row.try_get("count50")?,
            count_miss: row.try_get("countmiss")?,
            count_geki: row.try_get("countgeki")?,
            count_katu: row.try_get("countkatu")?,
            mods: row.try_get("enabled_mods")?,
            pp: row.try_get("pp")?
        })
    }

    fn difficulty_from_row(row: &Row) -> Result<DifficultyRow, DbError> {
        Ok(DifficultyRow {
            map_id: row.try_get("beatmap_id")?,
            num_circles: row.try_get("countnormal")?,
            num_sliders: row.try_get("countslider")?,
            num_spinners: row.try_get("countspinner")?,
            play_mode: row.try_get("playmode")?,
            approved: row.try_get("approved")?,
            score_version: row.try_get("score_version")?,
            mods: row.try_get("mods")?,
            attribute_id: row.try_get("attrib_id")?,
            value: row.try_get("value")?
        })
    }
}

async fn open(config: &Config) -> Result<Client, tokio_postgres::Error> {
    let (client, connection) = config.connect(NoTls).await?;

    // Spawn the connection object to run in the background
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("connection error: {}", e);
        }
    });

    Ok(client)
}

/// `host:port/dbname` without credentials, for logs.
fn describe(config: &Config) -> String {
    let host = match config.get_hosts().first() {
        Some(Host::Tcp(host)) => host.clone(),
        #[cfg(unix)]
        Some(Host::Unix(path)) => path.display().to_string(),
        None => "localhost".to_string()
    };
    let port = config.get_ports().first().copied().unwrap_or(5432);
    format!("{}:{}/{}", host, port, config.get_dbname().unwrap_or("postgres"))
}

impl Store for DbClient {
    fn scores_by_player(&self, mode: GameMode, player_id: i64) -> Result<Vec<ScoreRow>, DbError> {
        let sql = format!(
            "SELECT score_id, user_id, beatmap_id, score, maxcombo, count300, count100, count50, \
             countmiss, countgeki, countkatu, enabled_mods, pp \
             FROM osu_scores{}_high WHERE user_id = $1",
            mode.suffix()
        );

        self.query(&sql, &[&player_id])?.iter().map(Self::score_from_row).collect()
    }

    fn scores_after(&self, mode: GameMode, after: i64, limit: i64) -> Result<Vec<NewScore>, DbError> {
        let sql = format!(
            "SELECT score_id, user_id, pp FROM osu_scores{}_high \
             WHERE score_id > $1 ORDER BY score_id ASC LIMIT $2",
            mode.suffix()
        );

        self.query(&sql, &[&after, &limit])?
            .iter()
            .map(|row| {
                Ok(NewScore {
                    score_id: row.try_get("score_id")?,
                    player_id: row.try_get("user_id")?,
                    pp: row.try_get("pp")?
                })
            })
            .collect()
    }

    fn score_owner(&self, mode: GameMode, score_id: i64) -> Result<Option<ScoreOwner>, DbError> {
        let sql = format!(
            "SELECT user_id, enabled_mods FROM osu_scores{}_high WHERE score_id = $1",
            mode.suffix()
        );

        self.query_opt(&sql, &[&score_id])?
            .map(|row| {
                Ok(ScoreOwner {
                    player_id: row.try_get("user_id")?,
                    mods: row.try_get("enabled_mods")?
                })
            })
            .transpose()
    }

    fn difficulty_rows(&self, mode: GameMode, range: MapRange) -> Result<Vec<DifficultyRow>, DbError> {
        let base = "SELECT b.beatmap_id, b.countnormal, b.countslider, b.countspinner, b.playmode, b.approved, \
             b.score_version, a.mods, a.attrib_id, a.value \
             FROM osu_beatmaps b JOIN osu_beatmap_difficulty_attribs a ON b.beatmap_id = a.beatmap_id \
             WHERE (b.playmode = 0 OR b.playmode = $1) AND a.mode = $1 AND b.approved BETWEEN $2 AND $3";

        let mode_id = mode as i32;
        let min_status = RankedStatus::MIN_ACCEPTED as i32;
        let max_status = RankedStatus::MAX_ACCEPTED as i32;

        let rows = match range {
            MapRange::Single(map_id) => self.query(
                &format!("{base} AND b.beatmap_id = $4"),
                &[&mode_id, &min_status, &max_status, &map_id]
            )?,
            MapRange::Range(start, end) => self.query(
                &format!("{base} AND b.beatmap_id >= $4 AND b.beatmap_id < $5"),
                &[&mode_id, &min_status, &max_status, &start, &end]
            )?
        };

        rows.iter().map(Self::difficulty_from_row).collect()
    }

    fn map_id_bounds(&self, mode: GameMode) -> Result<MapIdBounds, DbError> {
        let row = self
            .query_opt(
                "SELECT MAX(beatmap_id) AS max_id, COUNT(*) AS count FROM osu_beatmaps \
                 WHERE approved BETWEEN $1 AND $2 AND (playmode = 0 OR playmode = $3)",
                &[
                    &(RankedStatus::MIN_ACCEPTED as i32),
                    &(RankedStatus::MAX_ACCEPTED as i32),
                    &(mode as i32)
                ]
            )?
            .ok_or_else(|| DbError::NotFound {
                what: "beatmap id stats".to_string()
            })?;

        Ok(MapIdBounds {
            max_id: row.try_get::<_, Option<i32>>("max_id")?.unwrap_or(0),
            count: row.try_get("count")?
        })
    }

    fn latest_approval(&self) -> Result<Option<NaiveDateTime>, DbError> {
        match self.query_opt("SELECT MAX(approved_date) AS latest FROM osu_beatmapsets", &[])? {
            Some(row) => Ok(row.try_get("latest")?),
            None => Ok(None)
        }
    }

    fn maps_approved_since(&self, since: NaiveDateTime) -> Result<Vec<ApprovedMap>, DbError> {
        self.query(
            "SELECT b.beatmap_id, s.approved_date FROM osu_beatmapsets s \
             JOIN osu_beatmaps b ON s.beatmapset_id = b.beatmapset_id \
             WHERE s.approved_date > $1 ORDER BY s.approved_date ASC",
            &[&since]
        )?
        .iter()
        .map(|row| {
            Ok(ApprovedMap {
                map_id: row.try_get("beatmap_id")?,
                approved_date: row.try_get("approved_date")?
            })
        })
        .collect()
    }

    fn blacklisted_maps(&self, mode: GameMode) -> Result<Vec<i32>, DbError> {
        self.query(
            "SELECT beatmap_id FROM osu_beatmap_performance_blacklist WHERE mode = $1",
            &[&(mode as i32)]
        )?
        .iter()
        .map(|row| Ok(row.try_get("beatmap_id")?))
        .collect()
    }

    fn attribute_names(&self) -> Result<Vec<(i32, String)>, DbError> {
        self.query(
            "SELECT attrib_id, name FROM osu_difficulty_attribs ORDER BY attrib_id DESC",
            &[]
        )?
        .iter()
        .map(|row| Ok((row.try_get("attrib_id")?, row.try_get("name")?)))
        .collect()
    }

    fn stored_rating(&self, mode: GameMode, player_id: i64, column: &str) -> Result<Option<f64>, DbError> {
        let sql = format!(
            "SELECT \"{}\" AS rating FROM osu_user_stats{} WHERE user_id = $1",
            column,
            mode.suffix()
        );

        match self.query_opt(&sql, &[&player_id])? {
            Some(row) => Ok(row.try_get("rating")?),
            None => Ok(None)
        }
    }

    fn count(&self, key: &str) -> Result<Option<i64>, DbError> {
        match self.query_opt("SELECT count FROM osu_counts WHERE name = $1", &[&key])? {
            Some(row) => Ok(row.try_get("count")?),
            None => Ok(None)
        }
    }

    fn max_score_id(&self, mode: GameMode) -> Result<Option<i64>, DbError> {
        let sql = format!("SELECT MAX(score_id) AS max_id FROM osu_scores{}_high", mode.suffix());
        match self.query_opt(&sql, &[])? {
            Some(row) => Ok(row.try_get("max_id")?),
            None => Ok(None)
        }
    }

    fn player_ids_after(&self, mode: GameMode, after: i64, limit: i64) -> Result<Vec<i64>, DbError> {
        let sql = format!(
            "SELECT user_id FROM osu_user_stats{} WHERE user_id > $1 ORDER BY user_id ASC LIMIT $2",
            mode.suffix()
        );

        self.query(&sql, &[&after, &limit])?
            .iter()
            .map(|row| Ok(row.try_get("user_id")?))
            .collect()
    }

    fn player_count_from(&self, mode: GameMode, from: i64) -> Result<i64, DbError> {
        let sql = format!(
            "SELECT COUNT(user_id) AS count FROM osu_user_stats{} WHERE user_id >= $1",
            mode.suffix()
        );

        let row = self.query_opt(&sql, &[&from])?.ok_or_else(|| DbError::NotFound {
            what: "player count".to_string()
        })?;
        Ok(row.try_get("count")?)
    }

    fn player_id_by_name(&self, table: &str, name: &str) -> Result<Option<i64>, DbError> {
        let sql = format!("SELECT user_id FROM \"{}\" WHERE username = $1", table);
        match self.query_opt(&sql, &[&name])? {
            Some(row) => Ok(Some(row.try_get("user_id")?)),
            None => Ok(None)
        }
    }

    fn player_name(&self, table: &str, player_id: i64) -> Result<Option<String>, DbError> {
        let sql = format!("SELECT username FROM \"{}\" WHERE user_id = $1", table);
        match self.query_opt(&sql, &[&player_id])? {
            Some(row) => Ok(row.try_get("username")?),
            None => Ok(None)
        }
    }

    fn map_name(&self, map_id: i32) -> Result<Option<String>, DbError> {
        let name: Option<String> = match self.query_opt(
            "SELECT filename FROM osu_beatmaps WHERE beatmap_id = $1",
            &[&map_id]
        )? {
            Some(row) => row.try_get("filename")?,
            None => None
        };

        Ok(name.map(|n| n.strip_suffix(".osu").map(str::to_string).unwrap_or(n)))
    }

    fn execute(&self, sql: &str) -> Result<(), DbError> {
        debug!(target_db = %self.target, len = sql.len(), "Executing batch");
        self.batch_execute(sql)
    }
}

/// Opens [`DbClient`]s from connection strings.
#[derive(Debug, Clone)]
pub struct PgConnector {
    primary: String,
    replica: String
}

impl PgConnector {
    pub fn new(primary: impl Into<String>, replica: impl Into<String>) -> Self {
        PgConnector {
            primary: primary.into(),
            replica: replica.into()
        }
    }
}

impl Connector for PgConnector {
    fn primary(&self) -> Result<Arc<dyn Store>, DbError> {
        Ok(Arc::new(DbClient::connect(&self.primary)?))
    }

    fn replica(&self) -> Result<Arc<dyn Store>, DbError> {
        Ok(Arc::new(DbClient::connect(&self.replica)?))
    }
}
