mod room_service;

pub use room_service::{
    CreateRoomRequest, CreatedRoom, JoinRoomRequest, JoinedRoom, LeaveRoomRequest,
    ParticipantWithTrail, RecordLocationRequest, RoomPolicy, RoomService,
    RoomServiceDependencies,
};
