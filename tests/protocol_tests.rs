//! Wire protocol tests

#[cfg(test)]
mod tests {
    use serde_json::json;
    use taco_rescue::{
        protocol::{parse_state, EventAction, StateSnapshot},
        types::{Direction, DoorKey, FireValue, GridCell, PoiValue, WallDamage, WallKey},
        ClientError,
    };

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn server_state() -> serde_json::Value {
        json!({
            "step": 4,
            "agents": [
                { "id": 0, "x": 1, "y": 2, "carrying_victim": false },
                { "id": 1, "x": 0, "y": 0, "carrying_victim": true }
            ],
            "fire": [[0.0, 1.0], [2.0, 0.0]],
            "poi": [[0, 2], [0, 1]],
            "walls": [[[1, 0, 0, 1], [1, 1, 0, 0]], [[0, 0, 1, 1], [0, 1, 1, 0]]],
            "walls_damage": [[[0, 1, 0, 0], [0, 0, 0, 1]], [[0, 0, 0, 0], [2, 0, 0, 0]]],
            "doors": { "(1, 0)": [1, 1], "door-9": [0, 0, 0, 1] },
            "events": [
                { "step": 4, "id": 0, "action": "move", "pos": [1, 2] },
                { "step": 4, "id": 1, "action": "damage_wall", "pos1": [0, 0], "pos2": [0, 1] }
            ],
            "victims": [],
            "false_alarms": []
        })
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn server_state_decodes_rows_first() {
        let snapshot = parse_state(&body(server_state())).unwrap();
        let frame = snapshot.decode().unwrap();

        assert_eq!(frame.step, 4);
        assert_eq!(frame.fire[&GridCell::new(0, 1)], FireValue::Smoke);
        assert_eq!(frame.fire[&GridCell::new(1, 0)], FireValue::Fire);
        assert_eq!(frame.poi[&GridCell::new(0, 1)], PoiValue::Hidden);
        assert_eq!(frame.poi[&GridCell::new(1, 1)], PoiValue::Hidden);
        assert_eq!(frame.poi[&GridCell::new(1, 0)], PoiValue::Empty);

        // walls_damage sides run col + 1, row + 1, col - 1, row - 1
        assert_eq!(
            frame.walls[&WallKey::new(GridCell::new(0, 0), Direction::North)],
            WallDamage::Damaged
        );
        assert_eq!(
            frame.walls[&WallKey::new(GridCell::new(0, 1), Direction::South)],
            WallDamage::Damaged
        );
        assert_eq!(
            frame.walls[&WallKey::new(GridCell::new(1, 1), Direction::East)],
            WallDamage::Demolished
        );

        let agent = &frame.agents[0];
        assert_eq!(agent.cell(), GridCell::new(1, 2));
        assert!(frame.agents[1].carrying);

        let doors = frame.doors.unwrap();
        assert!(doors.contains(&DoorKey::new(GridCell::new(1, 0), GridCell::new(1, 1)).unwrap()));
        assert!(doors.contains(&DoorKey::new(GridCell::new(0, 1), GridCell::new(0, 0)).unwrap()));

        assert_eq!(snapshot.events[1].action, EventAction::DamageWall);
        assert_eq!(
            snapshot.events[1].edge(),
            Some((GridCell::new(0, 0), GridCell::new(0, 1)))
        );
    }

    #[test]
    fn doors_are_optional() {
        let mut state = server_state();
        state.as_object_mut().unwrap().remove("doors");
        let frame = parse_state(&body(state)).unwrap().decode().unwrap();
        assert!(frame.doors.is_none());
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[test]
    fn missing_field_is_a_parse_error() {
        let mut state = server_state();
        state.as_object_mut().unwrap().remove("fire");
        let err = parse_state(&body(state)).unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
    }

    #[test]
    fn ragged_wall_cell_is_a_schema_error() {
        let mut state = server_state();
        state["walls_damage"] = json!([[[0, 0, 0]]]);
        let snapshot: StateSnapshot = parse_state(&body(state)).unwrap();
        assert!(matches!(snapshot.decode(), Err(ClientError::Schema(_))));
    }

    #[test]
    fn duplicate_agents_and_bad_codes_are_rejected() {
        let mut dup = server_state();
        dup["agents"] = json!([
            { "id": 3, "x": 0, "y": 0 },
            { "id": 3, "x": 1, "y": 1 }
        ]);
        assert!(parse_state(&body(dup)).unwrap().decode().unwrap_err().is_parse());

        let mut bad_fire = server_state();
        bad_fire["fire"] = json!([[0, 7]]);
        assert!(parse_state(&body(bad_fire)).unwrap().decode().is_err());

        let mut bad_door = server_state();
        bad_door["doors"] = json!({ "x": [0, 0, 3, 3] });
        assert!(parse_state(&body(bad_door)).unwrap().decode().is_err());
    }

    #[test]
    fn extreme_door_coordinates_are_a_schema_error() {
        let mut state = server_state();
        state["doors"] = json!({ "d": [i32::MIN, 0, 1, 0] });
        let err = parse_state(&body(state)).unwrap().decode().unwrap_err();
        assert!(matches!(err, ClientError::Schema(_)));

        let mut state = server_state();
        state["doors"] = json!({ "(2147483647, 0)": [-2147483648, 0] });
        assert!(parse_state(&body(state)).unwrap().decode().is_err());
    }
}
