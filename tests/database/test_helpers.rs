use lazy_static::lazy_static;
use pp_processor::{
    database::{db::DbClient, Store},
    model::{mods::Mods, structures::difficulty_attribute::DifficultyAttribute},
    utils::test_utils::{attribute_id, generate_osu_beatmap}
};
use std::sync::Arc;
use strum::IntoEnumIterator;
use testcontainers::{clients::Cli, Container};
use testcontainers_modules::postgres::Postgres;

pub struct TestDatabase {
    pub connection_string: String,
    _container: Container<'static, Postgres>
}

impl TestDatabase {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        lazy_static! {
            static ref DOCKER: Arc<Cli> = Arc::new(Cli::default());
        }

        let container = DOCKER.run(Postgres::default());
        let port = container.get_host_port_ipv4(5432);

        let connection_string = format!(
            "host=localhost port={} user=postgres password=postgres dbname=postgres",
            port
        );

        let client = DbClient::connect(&connection_string)?;
        client.execute(include_str!("schema.sql"))?;

        Ok(TestDatabase {
            connection_string,
            _container: container
        })
    }

    pub fn client(&self) -> Result<DbClient, Box<dyn std::error::Error>> {
        Ok(DbClient::connect(&self.connection_string)?)
    }

    /// Two ranked maps, one pending map, three players and their scores.
    pub fn seed_test_data(&self) -> Result<(), Box<dyn std::error::Error>> {
        let client = self.client()?;

        client.execute(
            "INSERT INTO osu_beatmapsets (beatmapset_id, approved_date) VALUES \
             (1, '2024-01-01 00:00:00'), (2, '2024-02-01 00:00:00'), (3, NULL);\
             INSERT INTO osu_beatmaps (beatmap_id, beatmapset_id, filename, countnormal, countslider, countspinner, \
             playmode, approved, score_version) VALUES \
             (10, 1, 'Artist - First (Mapper) [Hard].osu', 400, 90, 10, 0, 1, 1), \
             (20, 2, 'Artist - Second (Mapper) [Insane].osu', 400, 90, 10, 0, 2, 1), \
             (30, 3, 'Artist - Pending (Mapper) [Easy].osu', 100, 10, 1, 0, 0, 1);\
             INSERT INTO osu_beatmap_performance_blacklist (beatmap_id, mode) VALUES (20, 1);"
        )?;

        // Nomod attributes of a generated standard map, shared by all three maps
        let beatmap = generate_osu_beatmap(10);
        let mut attributes = Vec::new();
        for map_id in [10, 20, 30] {
            for attribute in DifficultyAttribute::iter() {
                let value = beatmap.attribute(Mods::NOMOD, attribute);
                attributes.push(format!("({map_id}, 0, 0, {}, {value})", attribute_id(attribute)));
            }
        }
        client.execute(&format!(
            "INSERT INTO osu_beatmap_difficulty_attribs (beatmap_id, mode, mods, attrib_id, value) VALUES {};",
            attributes.join(", ")
        ))?;

        client.execute(
            "INSERT INTO sample_users (user_id, username, user_warnings) VALUES \
             (1, 'TestPlayer1', 0), (2, 'TestPlayer2', 0), (3, 'Restricted', 1);\
             INSERT INTO osu_user_stats (user_id, rank_score, accuracy_new) VALUES \
             (1, 0, 0), (2, 0, 0), (3, 0, 0);\
             INSERT INTO osu_scores_high (score_id, user_id, beatmap_id, score, maxcombo, count300, count100, \
             count50, countmiss, countgeki, countkatu, enabled_mods, pp) VALUES \
             (100, 1, 10, 1000000, 700, 500, 0, 0, 0, 0, 0, 0, NULL), \
             (101, 1, 20, 900000, 650, 480, 15, 5, 0, 0, 0, 8, NULL), \
             (102, 2, 10, 800000, 300, 450, 40, 5, 5, 0, 0, 0, 12.5), \
             (103, 2, 30, 1000000, 150, 120, 0, 0, 0, 0, 0, 0, NULL), \
             (104, 3, 10, 1000000, 700, 500, 0, 0, 0, 0, 0, 0, NULL);\
             INSERT INTO score_process_queue (score_id, mode) VALUES (100, 0), (101, 0), (102, 0), (103, 0), (104, 0);"
        )?;

        Ok(())
    }
}
