/// Contextual data retrieval from the flai database.
///
/// Looks up the county containing each geocoded point, then gathers that
/// county's precipitation history, flood event history, and Social
/// Vulnerability Index rows. The hourly forecast is fetched by
/// coordinates and attached independently of county resolution.
///
/// Retrieval is deliberately forgiving: a failed category query logs and
/// leaves that field absent; only a missing county (or unusable
/// coordinates/FIPS) marks the whole record with a `status`.

use postgres::Client;

use crate::ingest::maps::GoogleMapsClient;
use crate::logging::{self, DataSource};
use crate::model::{
    CountyData, EventLocation, FloodEvent, ForecastHour, InputLocation, LocationRecord,
    LocationStatus, MonthlyPrecipitation, OverallRanking, SviData,
};

const MILES_PER_METER: f64 = 0.000_621_371;

// ---------------------------------------------------------------------------
// County lookup
// ---------------------------------------------------------------------------

/// Find the county containing the given WGS84 point, if any.
///
/// The county geometries are stored in EPSG:5070 (CONUS Albers), so the
/// query point is transformed before the intersection test.
pub fn county_for_point(
    client: &mut Client,
    lat: f64,
    lon: f64,
) -> Result<Option<CountyData>, postgres::Error> {
    let query = "
        SELECT c.fips_county_code, c.County, s.State, c.areaSQMI::float8
        FROM flai.TCLCounties c
        JOIN flai.TCLStates s ON c.idState = s.idState
        WHERE ST_Intersects(c.geometry, ST_Transform(ST_SetSRID(ST_MakePoint($1, $2), 4326), 5070))
    ";

    let rows = client.query(query, &[&lon, &lat])?;

    Ok(rows.first().map(|row| CountyData {
        fips_code: row.get(0),
        county_name: row.get(1),
        state_name: row.get(2),
        area_sqmi: row.get(3),
    }))
}

// ---------------------------------------------------------------------------
// Precipitation history
// ---------------------------------------------------------------------------

/// Monthly precipitation history for a county, chronological.
pub fn precipitation_history(
    client: &mut Client,
    fips_code: &str,
) -> Result<Vec<MonthlyPrecipitation>, postgres::Error> {
    let query = "
        SELECT year, month, totalPrecipitation_in::float8
        FROM flai.TBLMonthlyPrecipitation
        WHERE fips_county_code = $1
        ORDER BY year, month
    ";

    let rows = client.query(query, &[&fips_code])?;

    Ok(rows
        .iter()
        .map(|row| MonthlyPrecipitation {
            year: row.get(0),
            month: row.get(1),
            precipitation_in: row.get(2),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Flood event history
// ---------------------------------------------------------------------------

/// Historical flood events for a county, sorted nearest first relative
/// to the query point, each annotated with the nearest formatted address
/// where coordinates allow.
///
/// The query does not deduplicate: join fan-out can surface the same
/// event more than once, and downstream filtering operates on the rows
/// as stored.
pub fn flood_history(
    client: &mut Client,
    fips_code: &str,
    maps: &GoogleMapsClient,
    user_lat: f64,
    user_lon: f64,
) -> Result<Vec<FloodEvent>, postgres::Error> {
    let query = "
        SELECT
            et.EventType,
            e.beginDate,
            e.warning_zone,
            c.County,
            ST_Y(e.geometry) AS latitude,
            ST_X(e.geometry) AS longitude,
            ST_Distance(
                e.geometry::geography,
                ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography
            ) AS distance_meters
        FROM flai.TBLFloodEvents e
        JOIN flai.TCLEventTypes et ON e.idEventType = et.idEventType
        LEFT JOIN flai.TCLCounties c ON e.fips_county_code = c.fips_county_code
        WHERE e.fips_county_code = $3
        ORDER BY distance_meters ASC
    ";

    let rows = client.query(query, &[&user_lon, &user_lat, &fips_code])?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    logging::info(
        DataSource::Database,
        Some(fips_code),
        &format!(
            "Found {} historical flood events. Reverse geocoding nearest addresses...",
            rows.len()
        ),
    );

    let mut events = Vec::with_capacity(rows.len());
    for row in &rows {
        let date: chrono::NaiveDate = row.get(1);
        let county: Option<String> = row.get(3);
        let latitude: Option<f64> = row.get(4);
        let longitude: Option<f64> = row.get(5);
        let distance_meters: Option<f64> = row.get(6);

        let nearest_address = match (latitude, longitude) {
            (Some(lat), Some(lon)) => maps.reverse_geocode(lat, lon),
            _ => None,
        };

        events.push(FloodEvent {
            event_type: row.get(0),
            date: date.format("%Y-%m-%d").to_string(),
            distance_from_query_point_miles: distance_meters.map(miles_from_meters),
            warning_zone: row.get(2),
            county: county.unwrap_or_else(|| "Not Assigned (e.g., Offshore)".to_string()),
            location: EventLocation { latitude, longitude },
            nearest_address,
        });
    }

    Ok(events)
}

fn miles_from_meters(meters: f64) -> f64 {
    let miles = meters * MILES_PER_METER;
    (miles * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Social Vulnerability Index
// ---------------------------------------------------------------------------

/// One SVI fact row: theme-level when `variable` is null, variable-level
/// otherwise.
struct SviRow {
    overall_national: Option<f64>,
    overall_state: Option<f64>,
    theme: String,
    variable: Option<String>,
    value: Option<f64>,
}

/// SVI data for a county and release year, restructured into the nested
/// theme → variable → percentile mapping. `None` when the county has no
/// rows for that year.
pub fn svi_for_county(
    client: &mut Client,
    fips_code: &str,
    release_year: i32,
) -> Result<Option<SviData>, postgres::Error> {
    let query = "
        SELECT
            s.overallNational::float8,
            s.overallState::float8,
            t.Theme,
            v.SVIVariable,
            s.SVIValue::float8
        FROM flai.TBLSVI s
        JOIN flai.TCLSVIThemes t ON s.idSVITheme = t.idSVITheme
        LEFT JOIN flai.TCLSVIVariables v ON s.idSVIVariable = v.idSVIVariable
        WHERE s.fips_county_code = $1 AND s.release_year = $2
    ";

    let rows = client.query(query, &[&fips_code, &release_year])?;

    let svi_rows: Vec<SviRow> = rows
        .iter()
        .map(|row| SviRow {
            overall_national: row.get(0),
            overall_state: row.get(1),
            theme: row.get(2),
            variable: row.get(3),
            value: row.get(4),
        })
        .collect();

    Ok(build_svi_data(release_year, svi_rows))
}

fn build_svi_data(release_year: i32, rows: Vec<SviRow>) -> Option<SviData> {
    let first = rows.first()?;

    let mut svi = SviData {
        release_year,
        overall_ranking: OverallRanking {
            national: first.overall_national,
            state: first.overall_state,
        },
        themes: Default::default(),
        variables: Default::default(),
    };

    for row in rows {
        match row.variable {
            None => {
                svi.themes.insert(row.theme, row.value);
            }
            Some(variable) => {
                svi.variables
                    .entry(row.theme)
                    .or_default()
                    .insert(variable, row.value);
            }
        }
    }

    Some(svi)
}

// ---------------------------------------------------------------------------
// Per-location enrichment
// ---------------------------------------------------------------------------

/// Enrich every geocoded location with county-keyed data and, when
/// requested, an hourly forecast. Output order matches input order; a
/// location that cannot be enriched still yields a record, carrying the
/// appropriate `status`.
pub fn contextual_data_for_locations(
    client: &mut Client,
    maps: &GoogleMapsClient,
    locations: &[InputLocation],
    forecast_hours: Option<i64>,
    svi_release_year: i32,
) -> Vec<LocationRecord> {
    let mut enriched = Vec::with_capacity(locations.len());

    for location in locations {
        let lat = location.latitude;
        let lon = location.longitude;

        logging::info(
            DataSource::Database,
            Some(&location.name),
            &format!("Fetching contextual data ({}, {})", lat, lon),
        );

        if !lat.is_finite() || !lon.is_finite() {
            logging::warn(DataSource::Database, Some(&location.name), "unusable coordinates");
            enriched.push(status_record(location, LocationStatus::MissingCoordinates, None));
            continue;
        }

        // The forecast is keyed by coordinates, so it is fetched before
        // county resolution and attached even to status records.
        let precipitation_forecast = forecast_hours.map(|hours| {
            match maps.hourly_forecast(lat, lon, hours) {
                Ok(forecast) => forecast,
                Err(e) => {
                    logging::log_upstream_failure(
                        DataSource::Maps,
                        &location.name,
                        "hourly forecast",
                        &e,
                    );
                    Vec::new()
                }
            }
        });

        let county = match county_for_point(client, lat, lon) {
            Ok(county) => county,
            Err(e) => {
                logging::error(
                    DataSource::Database,
                    Some(&location.name),
                    &format!("county lookup failed: {}", e),
                );
                None
            }
        };

        let Some(county) = county else {
            logging::warn(
                DataSource::Database,
                Some(&location.name),
                "not within a known county",
            );
            enriched.push(status_record(location, LocationStatus::NoCountyFound, precipitation_forecast));
            continue;
        };

        if county.fips_code.is_empty() {
            logging::warn(
                DataSource::Database,
                Some(&location.name),
                "county has no FIPS code",
            );
            enriched.push(status_record(location, LocationStatus::MissingFips, precipitation_forecast));
            continue;
        }

        logging::info(
            DataSource::Database,
            Some(&location.name),
            &format!("Found county: {} ({})", county.county_name, county.fips_code),
        );

        let fips = county.fips_code.clone();
        enriched.push(LocationRecord {
            input_location: Some(location.clone()),
            status: None,
            precipitation_history: log_on_query_error(
                precipitation_history(client, &fips),
                &location.name,
                "precipitation history",
            ),
            flood_event_history: log_on_query_error(
                flood_history(client, &fips, maps, lat, lon),
                &location.name,
                "flood history",
            ),
            social_vulnerability_index: log_on_query_error(
                svi_for_county(client, &fips, svi_release_year),
                &location.name,
                "SVI lookup",
            )
            .flatten(),
            precipitation_forecast,
            county_data: Some(county),
        });
    }

    enriched
}

fn status_record(
    location: &InputLocation,
    status: LocationStatus,
    precipitation_forecast: Option<Vec<ForecastHour>>,
) -> LocationRecord {
    LocationRecord {
        input_location: Some(location.clone()),
        status: Some(status),
        precipitation_forecast,
        ..Default::default()
    }
}

fn log_on_query_error<T>(
    result: Result<T, postgres::Error>,
    location_name: &str,
    operation: &str,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            logging::error(
                DataSource::Database,
                Some(location_name),
                &format!("{} failed: {}", operation, e),
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miles_from_meters_rounds_to_hundredths() {
        assert_eq!(miles_from_meters(1609.344), 1.0);
        assert_eq!(miles_from_meters(0.0), 0.0);
        assert_eq!(miles_from_meters(5000.0), 3.11);
    }

    #[test]
    fn test_build_svi_data_separates_themes_and_variables() {
        let rows = vec![
            SviRow {
                overall_national: Some(71.2),
                overall_state: Some(64.5),
                theme: "Socioeconomic Status".to_string(),
                variable: None,
                value: Some(80.0),
            },
            SviRow {
                overall_national: Some(71.2),
                overall_state: Some(64.5),
                theme: "Socioeconomic Status".to_string(),
                variable: Some("Below Poverty".to_string()),
                value: Some(90.1),
            },
            SviRow {
                overall_national: Some(71.2),
                overall_state: Some(64.5),
                theme: "Housing Type & Transportation".to_string(),
                variable: Some("Mobile Homes".to_string()),
                value: None,
            },
        ];

        let svi = build_svi_data(2022, rows).unwrap();
        assert_eq!(svi.release_year, 2022);
        assert_eq!(svi.overall_ranking.national, Some(71.2));
        assert_eq!(svi.overall_ranking.state, Some(64.5));
        assert_eq!(svi.themes.get("Socioeconomic Status"), Some(&Some(80.0)));
        assert_eq!(
            svi.variables
                .get("Socioeconomic Status")
                .and_then(|vars| vars.get("Below Poverty")),
            Some(&Some(90.1))
        );
        assert_eq!(
            svi.variables
                .get("Housing Type & Transportation")
                .and_then(|vars| vars.get("Mobile Homes")),
            Some(&None)
        );
    }

    #[test]
    fn test_build_svi_data_empty_rows_is_none() {
        assert!(build_svi_data(2022, Vec::new()).is_none());
    }
}
