use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{ElectricityReading, GasReading};

/// Most recent row of `electricity_device_data` for one meter.
///
/// Columns are `NUMERIC` in the store and cast to `float8` here; the aliases
/// match the field names of `ElectricityValues`.
pub async fn latest_electricity_reading(
    pool: &PgPool,
    device_id: i64,
) -> Result<Option<ElectricityReading>> {
    let row = sqlx::query_as::<_, ElectricityReading>(
        r#"
        SELECT
            device_id,
            time_reading,
            u_l1_n::float8               AS u_l1_n,
            u_l2_n::float8               AS u_l2_n,
            u_l3_n::float8               AS u_l3_n,
            u_l1_l2::float8              AS u_l1_l2,
            u_l2_l3::float8              AS u_l2_l3,
            u_l3_l1::float8              AS u_l3_l1,
            i_l1::float8                 AS i_l1,
            i_l2::float8                 AS i_l2,
            i_l3::float8                 AS i_l3,
            p_l1::float8                 AS p_l1,
            p_l2::float8                 AS p_l2,
            p_l3::float8                 AS p_l3,
            p_sum::float8                AS p_sum,
            "q_L1"::float8               AS q_l1,
            q_l2::float8                 AS q_l2,
            q_l3::float8                 AS q_l3,
            q_sum::float8                AS q_sum,
            all_energy::float8           AS all_energy,
            reactive_energy_sum::float8  AS reactive_energy_sum,
            freq::float8                 AS freq,
            aq_1::float8                 AS aq_1,
            aq_2::float8                 AS aq_2,
            aq_3::float8                 AS aq_3,
            fund_pf_cf1::float8          AS fund_pf_cf1,
            fund_pf_cf2::float8          AS fund_pf_cf2,
            fund_pf_cf3::float8          AS fund_pf_cf3,
            rotation_field::float8       AS rotation_field,
            rqc_l1::float8               AS rqc_l1,
            rqc_l2::float8               AS rqc_l2,
            rqc_l3::float8               AS rqc_l3,
            rqd_l1::float8               AS rqd_l1,
            rqd_l2::float8               AS rqd_l2,
            rqd_l3::float8               AS rqd_l3,
            react_q_i_l1::float8         AS react_q_i_l1,
            react_q_i_l2::float8         AS react_q_i_l2,
            react_q_i_l3::float8         AS react_q_i_l3,
            react_q_c_l1::float8         AS react_q_c_l1,
            react_q_c_l2::float8         AS react_q_c_l2,
            react_q_c_l3::float8         AS react_q_c_l3,
            h_u_l1::float8               AS h_u_l1,
            h_u_l2::float8               AS h_u_l2,
            h_u_l3::float8               AS h_u_l3,
            h_i_l1::float8               AS h_i_l1,
            h_i_l2::float8               AS h_i_l2,
            h_i_l3::float8               AS h_i_l3,
            angle_1::float8              AS angle_1,
            angle_2::float8              AS angle_2,
            angle_3::float8              AS angle_3,
            all_energy_k::float8         AS all_energy_k
        FROM electricity_device_data
        WHERE device_id = $1
        ORDER BY time_reading DESC
        LIMIT 1
        "#,
    )
    .bind(device_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Most recent row of `gas_device_data` for one meter.
pub async fn latest_gas_reading(pool: &PgPool, device_id: i64) -> Result<Option<GasReading>> {
    let row = sqlx::query_as::<_, GasReading>(
        r#"
        SELECT
            device_id,
            time_reading,
            temperature_gas::float8     AS temperature_gas,
            working_volume::float8      AS working_volume,
            standard_volume::float8     AS standard_volume,
            instantaneous_flow::float8  AS instantaneous_flow,
            battery_live::float8        AS battery_live,
            pressure_gas::float8        AS pressure_gas,
            power::float8               AS power
        FROM gas_device_data
        WHERE device_id = $1
        ORDER BY time_reading DESC
        LIMIT 1
        "#,
    )
    .bind(device_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
